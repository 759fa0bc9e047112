use crate::clients::{
    ApiError, Clock, HttpOrderApi, IntervalClock, OrderApi, PushChannel, TrackingClient,
    WeakTrackingClient, WsPushChannel,
};
use crate::lifecycle::TrackerConfig;
use crate::tracking_actor::TrackingContext;
use std::sync::Arc;
use tracing::{error, info};

/// Runtime host for tracking sessions.
///
/// `TrackingSystem` owns the shared collaborators (order API, push channel, clock) and
/// spawns one session actor per [`track`](TrackingSystem::track) call. Sessions are
/// independent; they share transports but no state.
///
/// The system only holds weak handles. A session lives as long as the caller keeps a
/// [`TrackingClient`] to it; dropping the last one tears it down like an explicit close.
///
/// # Example
///
/// ```ignore
/// let mut system = TrackingSystem::from_config(TrackerConfig::from_env()?)?;
/// let tracker = system.track("6650f1c2a1b2c3d4e5f60718");
///
/// let done = tracker.wait_until(Duration::from_secs(120), |v| v.is_completed()).await;
///
/// system.shutdown().await?;
/// ```
pub struct TrackingSystem {
    config: TrackerConfig,
    context: TrackingContext,

    /// Running sessions, pruned as they finish
    sessions: Vec<RunningSession>,
}

struct RunningSession {
    client: WeakTrackingClient,
    /// Task handle (used for graceful shutdown)
    handle: tokio::task::JoinHandle<()>,
}

impl TrackingSystem {
    /// Creates a system over the given collaborators. Nothing runs until the first
    /// [`track`](TrackingSystem::track).
    pub fn new(
        config: TrackerConfig,
        api: Arc<dyn OrderApi>,
        push: Arc<dyn PushChannel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            context: TrackingContext::new(api, push, clock),
            sessions: Vec::new(),
        }
    }

    /// Wires the HTTP order API, the WebSocket push channel and a wall clock from `config`.
    pub fn from_config(config: TrackerConfig) -> Result<Self, ApiError> {
        let api = HttpOrderApi::new(&config.api_base_url, config.request_timeout)?;
        let push = WsPushChannel::new(&config.ws_base_url, config.session_buffer);
        let clock = IntervalClock::new(config.tick_interval);

        info!(
            api = %config.api_base_url,
            ws = %config.ws_base_url,
            tick_ms = config.tick_interval.as_millis() as u64,
            "Tracking system ready"
        );
        Ok(Self::new(config, Arc::new(api), Arc::new(push), Arc::new(clock)))
    }

    /// Starts a tracking session for `order_id` and returns its client.
    ///
    /// An invalid identifier still yields a session; its view carries the error and it
    /// performs no I/O.
    pub fn track(&mut self, order_id: &str) -> TrackingClient {
        self.sessions.retain(|session| !session.handle.is_finished());

        let (actor, client) = crate::tracking_actor::new(
            order_id,
            self.config.progress_step,
            self.config.session_buffer,
        );
        let handle = tokio::spawn(actor.run(self.context.clone()));

        self.sessions.push(RunningSession {
            client: client.downgrade(),
            handle,
        });
        client
    }

    /// Number of sessions whose task has not finished yet.
    pub fn running_sessions(&self) -> usize {
        self.sessions
            .iter()
            .filter(|session| !session.handle.is_finished())
            .count()
    }

    /// Gracefully shuts down every session.
    ///
    /// Each session unsubscribes and stops its timer before its task ends. Results that
    /// arrive afterwards are discarded.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if all sessions shut down cleanly
    /// - `Err(String)` if any session task failed or panicked
    pub async fn shutdown(self) -> Result<(), String> {
        info!(sessions = self.sessions.len(), "Shutting down tracking system...");

        // =====================================================================
        // Step 1: Tear down every session still reachable
        // =====================================================================

        for session in &self.sessions {
            // Sessions whose clients are all gone are already tearing themselves down.
            let Some(client) = session.client.upgrade() else {
                continue;
            };
            if let Err(e) = client.close().await {
                error!(order_id = client.order_id(), "Session close failed: {}", e);
            }
        }

        // =====================================================================
        // Step 2: Wait for all session tasks to complete
        // =====================================================================

        for session in self.sessions {
            if let Err(e) = session.handle.await {
                error!(order_id = session.client.order_id(), "Session task failed: {:?}", e);
                return Err(format!("Session task failed: {:?}", e));
            }
        }

        info!("Tracking system shutdown complete.");
        Ok(())
    }
}
