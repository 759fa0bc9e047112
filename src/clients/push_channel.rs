//! Push side of the order service: a long-lived stream of order snapshots.

use crate::clients::ChannelError;
use crate::model::{decode_snapshot, OrderId, OrderSnapshot};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};

/// One item delivered by a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    Snapshot(OrderSnapshot),
    /// The connection failed; nothing follows.
    Error(ChannelError),
    /// The server ended the stream; nothing follows.
    Closed,
}

/// Server-initiated order updates.
///
/// Delivery may repeat snapshots, skip some, or deliver older phases after newer ones.
/// Implementations never reconnect on their own.
#[async_trait]
pub trait PushChannel: Send + Sync + 'static {
    async fn subscribe(&self, order_id: &OrderId) -> Result<Subscription, ChannelError>;
}

/// Handle to one live subscription.
///
/// [`Subscription::unsubscribe`] is idempotent and also runs on drop, so a subscription is
/// released on every exit path, including when its owner is aborted.
#[derive(Debug)]
pub struct Subscription {
    order_id: OrderId,
    messages: mpsc::Receiver<PushMessage>,
    cancel: Option<oneshot::Sender<()>>,
}

impl Subscription {
    /// `cancel` is fired once on unsubscribe; the transport closes its connection when it fires
    /// or when it is dropped.
    pub fn new(
        order_id: OrderId,
        messages: mpsc::Receiver<PushMessage>,
        cancel: oneshot::Sender<()>,
    ) -> Self {
        Self {
            order_id,
            messages,
            cancel: Some(cancel),
        }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Next message, or `None` once the transport is gone.
    pub async fn next(&mut self) -> Option<PushMessage> {
        self.messages.recv().await
    }

    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            debug!(order_id = %self.order_id, "Unsubscribing");
            // The transport may already be gone after a failure.
            let _ = cancel.send(());
            self.messages.close();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// [`PushChannel`] over WebSocket: `{base}/ws/orders/{id}`, one JSON order per text frame.
#[derive(Debug, Clone)]
pub struct WsPushChannel {
    base_url: String,
    buffer: usize,
}

impl WsPushChannel {
    pub fn new(base_url: &str, buffer: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            buffer: buffer.max(1),
        }
    }

    fn order_url(&self, order_id: &OrderId) -> String {
        format!("{}/ws/orders/{order_id}", self.base_url)
    }
}

#[async_trait]
impl PushChannel for WsPushChannel {
    #[instrument(skip(self, order_id), fields(%order_id))]
    async fn subscribe(&self, order_id: &OrderId) -> Result<Subscription, ChannelError> {
        let url = self.order_url(order_id);
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        info!(%url, "Push channel connected");

        let (mut write, mut read) = stream.split();
        let (tx, rx) = mpsc::channel(self.buffer);
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let order = order_id.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut cancel_rx => {
                        debug!(order_id = %order, "Closing push channel");
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                    frame = read.next() => match frame {
                        Some(Ok(Message::Text(text))) => match decode_snapshot(&text) {
                            Ok(snapshot) => {
                                if tx.send(PushMessage::Snapshot(snapshot)).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => warn!(order_id = %order, error = %err, "Skipping undecodable frame"),
                        },
                        Some(Ok(Message::Close(_))) | None => {
                            let _ = tx.send(PushMessage::Closed).await;
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(order_id = %order, error = %err, "Push channel failed");
                            let _ = tx
                                .send(PushMessage::Error(ChannelError::Protocol(err.to_string())))
                                .await;
                            break;
                        }
                    },
                }
            }
        });

        Ok(Subscription::new(order_id.clone(), rx, cancel_tx))
    }
}
