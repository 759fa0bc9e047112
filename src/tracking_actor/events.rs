//! Inputs and outputs of the tracking state machine.

use crate::clients::{ApiError, ChannelError, CompletionReceipt};
use crate::model::{OrderId, OrderSnapshot};

/// Everything that can happen to a tracking session.
///
/// Fetch results, pushes, ticks and completion answers all arrive through the same queue,
/// in whatever order the runtime produces them.
#[derive(Debug)]
pub enum TrackingEvent {
    /// A pull fetch finished.
    Fetched(Result<OrderSnapshot, ApiError>),
    /// The push channel connected.
    ChannelOpened,
    /// The push channel delivered a snapshot.
    Pushed(OrderSnapshot),
    /// The push channel failed. It is not reopened.
    ChannelFailed(ChannelError),
    /// The server closed the push channel.
    ChannelClosed,
    /// The progress timer fired.
    Tick,
    /// The completion request finished.
    CompletionFinished(Result<CompletionReceipt, ApiError>),
    /// User asked to try a failed load again.
    Retry,
    /// User dismissed the current error message.
    DismissError,
}

/// Side effects requested by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingCommand {
    FetchOrder(OrderId),
    Subscribe(OrderId),
    Unsubscribe,
    StartTimer,
    StopTimer,
    RequestCompletion(OrderId),
}
