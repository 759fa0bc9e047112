//! Error types for the tracking actor.

use thiserror::Error;

/// Errors a tracking session reports to the user.
///
/// The `Display` text is what the view shows as its error message.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TrackingError {
    /// The order identifier was rejected before any network call.
    #[error("Invalid order identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The server has no order with this identifier.
    #[error("Order {0} was not found")]
    OrderNotFound(String),

    /// The order could not be loaded (network, server or payload problem).
    #[error("Could not load order: {0}")]
    FetchFailed(String),

    /// The live update channel failed. No reconnect is attempted.
    #[error("Live updates unavailable: {0}")]
    ChannelFailed(String),

    /// Marking the order as delivered failed. The next tick tries again.
    #[error("Could not confirm delivery: {0}")]
    CompletionFailed(String),
}

impl TrackingError {
    /// Errors that end the session's usefulness; they cannot be dismissed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TrackingError::InvalidIdentifier(_) | TrackingError::OrderNotFound(_)
        )
    }
}
