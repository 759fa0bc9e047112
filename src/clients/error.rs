//! Error types for the order service transports.

use crate::model::PayloadError;
use thiserror::Error;

/// Errors from the pull and completion endpoints.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// The server answered 404.
    #[error("Order not found")]
    NotFound,

    /// Any other non-success status.
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No response within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The response body was not a valid order.
    #[error("Invalid response: {0}")]
    Decode(String),

    /// The server answered `success: false`.
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl From<PayloadError> for ApiError {
    fn from(err: PayloadError) -> Self {
        ApiError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Errors from the push channel.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChannelError {
    /// The connection could not be established.
    #[error("Could not connect: {0}")]
    Connect(String),

    /// The connection broke after it was established.
    #[error("Connection lost: {0}")]
    Protocol(String),

    /// A frame could not be decoded.
    #[error("Undecodable message: {0}")]
    Decode(String),
}

impl From<PayloadError> for ChannelError {
    fn from(err: PayloadError) -> Self {
        ChannelError::Decode(err.to_string())
    }
}
