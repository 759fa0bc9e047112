use crate::clients::{ApiError, OrderApi};
use crate::model::{OrderId, OrderSnapshot};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Successful completion, as reported back to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReceipt {
    pub message: Option<String>,
    /// The completed order, when the server returned one.
    pub snapshot: Option<OrderSnapshot>,
}

/// Tells the server a delivery has finished.
///
/// One network call per [`CompletionNotifier::complete`]. The session guarantees at most one
/// call in flight; the server treats a repeat on a completed order as success.
#[derive(Clone)]
pub struct CompletionNotifier {
    api: Arc<dyn OrderApi>,
}

impl CompletionNotifier {
    pub fn new(api: Arc<dyn OrderApi>) -> Self {
        Self { api }
    }

    #[instrument(skip(self, order_id), fields(%order_id))]
    pub async fn complete(&self, order_id: &OrderId) -> Result<CompletionReceipt, ApiError> {
        let response = self.api.request_completion(order_id).await.map_err(|e| {
            warn!(error = %e, "Completion request failed");
            e
        })?;

        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "server refused completion".to_string());
            warn!(%message, "Completion rejected");
            return Err(ApiError::Rejected(message));
        }

        info!(message = ?response.message, "Delivery confirmed");
        Ok(CompletionReceipt {
            message: response.message,
            snapshot: response.snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{CompletionResponse, MockOrderApi};

    #[tokio::test]
    async fn success_passes_order_through() {
        let mock = MockOrderApi::new();
        mock.expect_completion().return_ok(CompletionResponse {
            success: true,
            message: Some("Order already completed".into()),
            snapshot: None,
        });

        let notifier = CompletionNotifier::new(Arc::new(mock.clone()));
        let receipt = notifier.complete(&OrderId::parse("o1").unwrap()).await.unwrap();

        assert_eq!(receipt.message.as_deref(), Some("Order already completed"));
        mock.verify();
    }

    #[tokio::test]
    async fn refusal_becomes_rejected() {
        let mock = MockOrderApi::new();
        mock.expect_completion().return_ok(CompletionResponse {
            success: false,
            message: None,
            snapshot: None,
        });

        let notifier = CompletionNotifier::new(Arc::new(mock.clone()));
        let result = notifier.complete(&OrderId::parse("o1").unwrap()).await;

        assert_eq!(
            result,
            Err(ApiError::Rejected("server refused completion".into()))
        );
    }

    #[tokio::test]
    async fn transport_errors_are_passed_on() {
        let mock = MockOrderApi::new();
        mock.expect_completion().return_err(ApiError::Timeout);

        let notifier = CompletionNotifier::new(Arc::new(mock.clone()));
        let result = notifier.complete(&OrderId::parse("o1").unwrap()).await;

        assert_eq!(result, Err(ApiError::Timeout));
        assert_eq!(mock.completion_calls(), 1);
    }
}
