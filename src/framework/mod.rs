//! Generic session framework.
//!
//! This module provides the building blocks for single-writer session actors: a state
//! machine that turns events into commands, and a runtime that turns commands into
//! background tasks whose results come back as events.
//!
//! # Main Components
//!
//! - [`SessionEntity`] - Trait that session state machines implement
//! - [`SessionActor`] - Generic actor that drives one entity
//! - [`SessionClient`] - Type-safe handle for sending events and observing the view
//! - [`CommandHandler`] / [`Task`] - How commands become background work
//! - [`FrameworkError`] - Common error types
//!
//! # Testing
//!
//! See [`mock`] module for utilities to test clients without spawning full actors.

pub mod core;
pub mod mock;

// Re-export core types for convenience
pub use core::*;
