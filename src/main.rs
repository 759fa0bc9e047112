//! # Drone Tracker
//!
//! Follows one order from the command line until it is delivered, fails fatally, or the
//! user presses Ctrl-C.
//!
//! ## 🚀 Usage
//!
//! ```bash
//! RUST_LOG=info drone-tracker 6650f1c2a1b2c3d4e5f60718 --api-url http://localhost:8000
//! ```
//!
//! Settings are resolved in order: defaults, `.env.local`, `TRACKER_*` environment
//! variables, then flags.

use clap::Parser;
use drone_tracker::lifecycle::{setup_tracing, TrackerConfig, TrackingSystem};
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

/// Track a drone food delivery.
#[derive(Debug, Parser)]
#[command(name = "drone-tracker", version)]
struct Args {
    /// Order identifier to track.
    order_id: String,

    /// Base URL of the order REST API.
    #[arg(long)]
    api_url: Option<String>,

    /// Base URL of the order push channel.
    #[arg(long)]
    ws_url: Option<String>,

    /// Milliseconds between progress ticks.
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Progress percentage added per tick.
    #[arg(long)]
    step: Option<u8>,
}

impl Args {
    fn apply(&self, config: &mut TrackerConfig) {
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(url) = &self.ws_url {
            config.ws_base_url = url.clone();
        }
        if let Some(ms) = self.tick_ms {
            config.tick_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(step) = self.step {
            config.progress_step = step.clamp(1, 100);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let _ = dotenvy::from_filename(".env.local");
    setup_tracing();

    let args = Args::parse();
    let mut config = TrackerConfig::from_env().map_err(|e| e.to_string())?;
    args.apply(&mut config);
    config.validate().map_err(|e| e.to_string())?;

    let mut system = TrackingSystem::from_config(config).map_err(|e| e.to_string())?;
    let tracker = system.track(&args.order_id);

    let span = tracing::info_span!("tracking", order_id = %args.order_id);
    async {
        let mut views = tracker.watch();
        loop {
            let view = views.borrow_and_update().clone();
            info!("{view}");

            if view.is_completed() {
                info!("Order delivered");
                break;
            }
            if view.has_fatal_error() {
                if let Some(message) = view.error_message() {
                    error!(error = %message, "Tracking stopped");
                }
                break;
            }

            tokio::select! {
                changed = views.changed() => {
                    if changed.is_err() {
                        warn!("Session ended unexpectedly");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }
    }
    .instrument(span)
    .await;

    system.shutdown().await?;

    info!("Tracker exited");
    Ok(())
}
