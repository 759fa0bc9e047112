use crate::framework::{FrameworkError, SessionClient, WeakSessionClient};
use crate::model::TrackingView;
use crate::tracking_actor::{TrackingEvent, TrackingSession};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

/// Client for one order's tracking session.
///
/// Cloning is cheap; every clone talks to the same session.
#[derive(Clone)]
pub struct TrackingClient {
    order_id: String,
    inner: SessionClient<TrackingSession>,
}

impl TrackingClient {
    pub fn new(order_id: impl Into<String>, inner: SessionClient<TrackingSession>) -> Self {
        Self {
            order_id: order_id.into(),
            inner,
        }
    }

    /// The identifier the session was opened with, as given.
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Current view, read through the session queue.
    #[instrument(skip(self), fields(order_id = %self.order_id))]
    pub async fn view(&self) -> Result<TrackingView, FrameworkError> {
        self.inner.view().await
    }

    /// Last published view, without waiting.
    pub fn latest(&self) -> TrackingView {
        self.inner.latest()
    }

    pub fn watch(&self) -> watch::Receiver<TrackingView> {
        self.inner.watch()
    }

    /// Waits until the published view satisfies `done`, or `timeout` elapses.
    ///
    /// Returns `None` on timeout or when the session ended first.
    pub async fn wait_until(
        &self,
        timeout: Duration,
        done: impl FnMut(&TrackingView) -> bool,
    ) -> Option<TrackingView> {
        let mut views = self.inner.watch();
        let waited = tokio::time::timeout(timeout, views.wait_for(done)).await;
        match waited {
            Ok(Ok(view)) => Some(view.clone()),
            _ => None,
        }
    }

    /// Re-fetches the order after a failed load.
    #[instrument(skip(self), fields(order_id = %self.order_id))]
    pub async fn retry(&self) -> Result<(), FrameworkError> {
        debug!("Retry requested");
        self.inner.send(TrackingEvent::Retry).await
    }

    #[instrument(skip(self), fields(order_id = %self.order_id))]
    pub async fn dismiss_error(&self) -> Result<(), FrameworkError> {
        self.inner.send(TrackingEvent::DismissError).await
    }

    /// Tears the session down: unsubscribes, stops the timer, drops late results.
    ///
    /// Closing an already closed session is not an error.
    #[instrument(skip(self), fields(order_id = %self.order_id))]
    pub async fn close(&self) -> Result<TrackingView, FrameworkError> {
        info!("Closing tracking session");
        match self.inner.shutdown().await {
            Err(FrameworkError::ActorClosed) => Ok(self.inner.latest()),
            other => other,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// A handle that does not keep the session alive. Dropping every `TrackingClient` still
    /// tears the session down.
    pub fn downgrade(&self) -> WeakTrackingClient {
        WeakTrackingClient {
            order_id: self.order_id.clone(),
            inner: self.inner.downgrade(),
        }
    }
}

/// Non-owning counterpart of [`TrackingClient`].
#[derive(Clone)]
pub struct WeakTrackingClient {
    order_id: String,
    inner: WeakSessionClient<TrackingSession>,
}

impl WeakTrackingClient {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// `None` once the session has been torn down.
    pub fn upgrade(&self) -> Option<TrackingClient> {
        self.inner
            .upgrade()
            .map(|inner| TrackingClient::new(self.order_id.clone(), inner))
    }
}
