//! Tick sources for the progress timer.

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};

/// Produces tick streams. Each call to [`Clock::ticker`] starts an independent timer.
///
/// `ticker` is called synchronously when a timer starts, so a tick sent after that call is
/// never lost.
pub trait Clock: Send + Sync + 'static {
    fn ticker(&self) -> BoxStream<'static, ()>;
}

/// Wall-clock ticks every `period`, first tick one period after start.
#[derive(Debug, Clone)]
pub struct IntervalClock {
    period: Duration,
}

impl IntervalClock {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
        }
    }
}

impl Clock for IntervalClock {
    fn ticker(&self) -> BoxStream<'static, ()> {
        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        IntervalStream::new(interval).map(|_| ()).boxed()
    }
}

/// Test clock: every running timer ticks once per [`ManualClock::tick`].
#[derive(Debug, Clone)]
pub struct ManualClock {
    ticks: broadcast::Sender<()>,
}

impl ManualClock {
    pub fn new() -> Self {
        let (ticks, _) = broadcast::channel(64);
        Self { ticks }
    }

    /// Fires one tick. Returns how many timers received it.
    pub fn tick(&self) -> usize {
        self.ticks.send(()).unwrap_or(0)
    }

    /// Number of timers currently running.
    pub fn running_timers(&self) -> usize {
        self.ticks.receiver_count()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn ticker(&self) -> BoxStream<'static, ()> {
        BroadcastStream::new(self.ticks.subscribe())
            .filter_map(|tick| async move { tick.ok() })
            .boxed()
    }
}
