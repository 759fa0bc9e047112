//! Process-level concerns: configuration, logging setup, and the system that hosts sessions.

pub mod config;
pub mod tracing;
pub mod tracking_system;

pub use config::*;
pub use tracking_system::*;
pub use self::tracing::setup_tracing;
