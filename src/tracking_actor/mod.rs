//! Order tracking: the reconciler state machine and the context that runs its commands.

pub mod context;
pub mod entity;
pub mod error;
pub mod events;
pub mod progress;

pub use context::*;
pub use entity::*;
pub use error::*;
pub use events::*;
pub use progress::*;

use crate::clients::TrackingClient;
use crate::framework::SessionActor;

/// Creates a tracking actor for `order_id` and its client.
pub fn new(
    order_id: &str,
    progress_step: u8,
    buffer_size: usize,
) -> (SessionActor<TrackingSession>, TrackingClient) {
    let session = TrackingSession::new(order_id, progress_step);
    let (actor, generic_client) = SessionActor::new(session, buffer_size);
    let client = TrackingClient::new(order_id, generic_client);

    (actor, client)
}
