//! Collaborators of a tracking session and the handle used to talk to one.
//!
//! - [`OrderApi`] / [`HttpOrderApi`]: pull fetch and completion request.
//! - [`PushChannel`] / [`WsPushChannel`]: server-pushed snapshots.
//! - [`CompletionNotifier`]: turns a completion answer into success or failure.
//! - [`Clock`]: tick sources for the progress timer.
//! - [`TrackingClient`]: type-safe wrapper around the session's [`SessionClient`](crate::framework::SessionClient).

pub mod clock;
pub mod completion;
pub mod error;
pub mod mock;
pub mod order_api;
pub mod push_channel;
pub mod tracking_client;

pub use clock::*;
pub use completion::*;
pub use error::*;
pub use mock::*;
pub use order_api::*;
pub use push_channel::*;
pub use tracking_client::*;
