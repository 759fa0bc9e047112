//! Pull side of the order service: fetch one order, request its completion.

use crate::clients::ApiError;
use crate::model::{CompletionPayload, OrderId, OrderPayload, OrderSnapshot};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Server answer to a completion request, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub success: bool,
    pub message: Option<String>,
    pub snapshot: Option<OrderSnapshot>,
}

/// Request/response access to the order service.
#[async_trait]
pub trait OrderApi: Send + Sync + 'static {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<OrderSnapshot, ApiError>;

    /// Asks the server to move the order to `COMPLETED`. Not idempotent on the wire.
    async fn request_completion(&self, order_id: &OrderId)
        -> Result<CompletionResponse, ApiError>;
}

/// [`OrderApi`] over HTTP.
///
/// - `GET {base}/orders/{id}` returns the order, 404 when unknown.
/// - `POST {base}/orders/{id}/complete` returns `{ success, message, order }`.
#[derive(Debug, Clone)]
pub struct HttpOrderApi {
    client: Client,
    base_url: String,
}

impl HttpOrderApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn order_url(&self, order_id: &OrderId) -> String {
        format!("{}/orders/{order_id}", self.base_url)
    }
}

/// Maps non-success statuses to [`ApiError`], keeping the server's `detail` text when present.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or(body);
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl OrderApi for HttpOrderApi {
    #[instrument(skip(self, order_id), fields(%order_id))]
    async fn fetch_order(&self, order_id: &OrderId) -> Result<OrderSnapshot, ApiError> {
        let url = self.order_url(order_id);
        debug!(%url, "Fetching order");

        let response = check_status(self.client.get(&url).send().await?).await?;
        let payload: OrderPayload = response.json().await?;
        Ok(OrderSnapshot::try_from(payload)?)
    }

    #[instrument(skip(self, order_id), fields(%order_id))]
    async fn request_completion(
        &self,
        order_id: &OrderId,
    ) -> Result<CompletionResponse, ApiError> {
        let url = format!("{}/complete", self.order_url(order_id));
        debug!(%url, "Requesting completion");

        let response = check_status(self.client.post(&url).send().await?).await?;
        let payload: CompletionPayload = response.json().await?;
        // The confirmation stands even when the echoed order is unusable; the session then
        // marks its own snapshot completed and re-fetches.
        let snapshot = payload
            .order
            .and_then(|order| match OrderSnapshot::try_from(order) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    warn!(error = %err, "Ignoring invalid order in completion answer");
                    None
                }
            });

        Ok(CompletionResponse {
            success: payload.success,
            message: payload.message,
            snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves exactly one canned HTTP response and returns the request line it saw.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}/"), handle)
    }

    fn api(base: &str) -> HttpOrderApi {
        HttpOrderApi::new(base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetch_decodes_order() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"_id":"abc123","status":"DELIVERING","total":9.5,"delivery_lat":1.0,"delivery_lon":2.0}"#,
        )
        .await;

        let id = OrderId::parse("abc123").unwrap();
        let snapshot = api(&base).fetch_order(&id).await.unwrap();

        assert_eq!(snapshot.id, id);
        assert_eq!(snapshot.total, 9.5);
        assert_eq!(server.await.unwrap(), "GET /orders/abc123 HTTP/1.1");
    }

    #[tokio::test]
    async fn fetch_maps_404_to_not_found() {
        let (base, _server) = serve_once("404 Not Found", r#"{"detail":"Order not found"}"#).await;
        let id = OrderId::parse("missing").unwrap();
        assert_eq!(api(&base).fetch_order(&id).await, Err(ApiError::NotFound));
    }

    #[tokio::test]
    async fn server_errors_keep_detail() {
        let (base, _server) =
            serve_once("400 Bad Request", r#"{"detail":"Invalid order_id"}"#).await;
        let id = OrderId::parse("x").unwrap();
        assert_eq!(
            api(&base).fetch_order(&id).await,
            Err(ApiError::Status {
                status: 400,
                message: "Invalid order_id".into()
            })
        );
    }

    #[tokio::test]
    async fn completion_posts_and_decodes() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"success":true,"message":"Order delivered successfully","order":{"id":"abc123","status":"COMPLETED"}}"#,
        )
        .await;

        let id = OrderId::parse("abc123").unwrap();
        let response = api(&base).request_completion(&id).await.unwrap();

        assert!(response.success);
        assert_eq!(
            response.snapshot.map(|s| s.phase),
            Some(crate::model::LifecyclePhase::Completed)
        );
        assert_eq!(server.await.unwrap(), "POST /orders/abc123/complete HTTP/1.1");
    }

    #[tokio::test]
    async fn completion_survives_invalid_echoed_order() {
        let (base, _server) = serve_once(
            "200 OK",
            r#"{"success":true,"message":"Order delivered successfully","order":{"id":"abc123","status":"TELEPORTED"}}"#,
        )
        .await;

        let id = OrderId::parse("abc123").unwrap();
        let response = api(&base).request_completion(&id).await.unwrap();

        assert!(response.success);
        assert_eq!(response.message.as_deref(), Some("Order delivered successfully"));
        assert_eq!(response.snapshot, None);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let id = OrderId::parse("abc").unwrap();
        let result = api(&format!("http://{addr}")).fetch_order(&id).await;
        assert!(matches!(result, Err(ApiError::Transport(_))));
    }
}
