//! Local delivery-progress simulation.

/// Default increment per tick, in percent.
pub const DEFAULT_PROGRESS_STEP: u8 = 5;

/// Monotonic 0..=100 counter advanced by a fixed step on every tick.
///
/// It never decreases and never resets; a new session gets a new simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSimulator {
    percent: u8,
    step: u8,
}

impl ProgressSimulator {
    /// A step of zero would never arrive, so it is raised to one.
    pub fn new(step: u8) -> Self {
        Self {
            percent: 0,
            step: step.max(1),
        }
    }

    /// Advances by one step, clamped at 100. Returns the new value.
    pub fn advance(&mut self) -> u8 {
        self.percent = self.percent.saturating_add(self.step).min(100);
        self.percent
    }

    /// Jumps straight to 100.
    pub fn finish(&mut self) {
        self.percent = 100;
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn is_finished(&self) -> bool {
        self.percent >= 100
    }
}

impl Default for ProgressSimulator {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_STEP)
    }
}
