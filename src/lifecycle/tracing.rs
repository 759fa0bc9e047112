//! # Observability & Tracing
//!
//! The [`setup_tracing`] function initializes structured logging with the `tracing` crate.
//!
//! ## Configuration
//!
//! The filter comes from `RUST_LOG` and falls back to `info`. The compact format hides the
//! module prefix (`with_target(false)`); log lines carry `order_id` as a structured field
//! instead.
//!
//! ## What Gets Traced
//!
//! - **Session lifecycle** (`info`): start, phase changes, completion request, teardown
//! - **Events and commands** (`debug`): every event the session applies and every command it issues
//! - **Transport calls** (`debug`): one span per HTTP request or subscription
//! - **Failures** (`warn`): fetch, channel and completion errors with their cause
//!
//! ## Usage Examples
//!
//! ```bash
//! # Phase changes and completion only
//! RUST_LOG=info drone-tracker 6650f1c2a1b2c3d4e5f60718
//!
//! # Every tick, push and command
//! RUST_LOG=debug drone-tracker 6650f1c2a1b2c3d4e5f60718
//!
//! # Only the transports
//! RUST_LOG=drone_tracker::clients=debug drone-tracker 6650f1c2a1b2c3d4e5f60718
//! ```
//!
//! With `RUST_LOG=info` a delivery looks like:
//!
//! ```text
//! INFO Session started session="6650f1c2a1b2c3d4e5f60718"
//! INFO subscribe: Push channel connected url="ws://localhost:8000/ws/orders/6650f1c2a1b2c3d4e5f60718"
//! INFO Phase changed order_id="6650f1c2a1b2c3d4e5f60718" phase=DELIVERING
//! INFO Delivery animation finished, requesting completion order_id=6650f1c2a1b2c3d4e5f60718
//! INFO complete: Delivery confirmed message=Some("Order delivered successfully")
//! INFO Phase changed order_id="6650f1c2a1b2c3d4e5f60718" phase=COMPLETED
//! INFO Session stopped session="6650f1c2a1b2c3d4e5f60718"
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(false) // order_id fields identify the session
        .compact()
        .init();
}
