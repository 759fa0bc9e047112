#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Drone Tracker
//!
//! > **Client-side tracking of drone food deliveries.**
//!
//! This crate keeps one consistent view of an order while it is being delivered. Three
//! sources feed that view: a pull fetch of the order, snapshots pushed by the server, and a
//! local timer that animates the drone along its path. When the animation reaches the end,
//! the session asks the server to mark the order delivered.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### One session, one task
//!
//! Every tracked order is a [`SessionActor`](framework::SessionActor) running in its own Tokio
//! task. Fetch results, pushes, ticks and completion answers all arrive as events on the
//! session's queue and are applied one at a time, so there are no locks around the state and
//! no interleaving between sources.
//!
//! ### Decide, then do
//!
//! The state machine ([`TrackingSession`](tracking_actor::TrackingSession)) never performs
//! I/O. Applying an event returns commands ("fetch", "start the timer", "request
//! completion"); the [`TrackingContext`](tracking_actor::TrackingContext) turns those into
//! futures and feeds whose results come back as events. This keeps every reconciliation rule
//! testable with plain `#[test]` functions.
//!
//! ### Teardown is final
//!
//! Closing a session unsubscribes from the push channel, stops the timer, and cancels calls
//! still in flight. A result that lands afterwards finds the queue closed and is dropped.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`framework`])
//! The generic session loop.
//! - **Role**: Separates the *reconciliation logic* (your entity) from the *plumbing* (queue, feeds, view publishing, teardown).
//! - **Key items**: [`SessionEntity`](framework::SessionEntity), [`SessionActor`](framework::SessionActor), [`Task`](framework::Task).
//!
//! ### 2. The Data ([`model`])
//! Order snapshots, lifecycle phases, geometry and the view handed to the UI.
//! - **Key items**: [`OrderSnapshot`](model::OrderSnapshot), [`LifecyclePhase`](model::LifecyclePhase), [`TrackingView`](model::TrackingView).
//!
//! ### 3. The Implementation ([`tracking_actor`])
//! The reconciler itself and the context that executes its commands.
//!
//! ### 4. The Interface ([`clients`])
//! Transports (HTTP order API, WebSocket push channel, clocks) behind traits, their test
//! doubles, and [`TrackingClient`](clients::TrackingClient), the handle the rest of the app uses.
//!
//! ### 5. The Orchestrator ([`lifecycle`])
//! Configuration, logging, and [`TrackingSystem`](lifecycle::TrackingSystem), which spawns
//! sessions and shuts them down.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! RUST_LOG=info cargo run -- 6650f1c2a1b2c3d4e5f60718
//! ```
//!
//! ## 🧪 Testing
//!
//! [`MockOrderApi`](clients::MockOrderApi), [`MockPushChannel`](clients::MockPushChannel) and
//! [`ManualClock`](clients::ManualClock) drive a real session without a server. See
//! `tests/tracking_scenarios.rs` for end-to-end scenarios.
//!
//! ```bash
//! cargo test
//! ```

pub mod clients;
pub mod framework;
pub mod lifecycle;
pub mod model;
pub mod tracking_actor;
