use crate::model::geo::GeoPoint;
use crate::model::order::{LifecyclePhase, OrderSnapshot, TimelineStep};
use crate::tracking_actor::TrackingError;
use std::fmt;

/// Read model published by a tracking session after every event.
///
/// `start_point` and `path_end` are the two ends of the drawn flight path; `path_end`
/// differs from `destination_point` only when both ends coincide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingView {
    pub order_id: String,
    pub phase: Option<LifecyclePhase>,
    pub progress_percent: u8,
    pub rendered_drone_point: Option<GeoPoint>,
    pub destination_point: Option<GeoPoint>,
    pub start_point: Option<GeoPoint>,
    pub path_end: Option<GeoPoint>,
    pub error: Option<TrackingError>,
    pub completion_in_flight: bool,
    pub live: bool,
    pub order: Option<OrderSnapshot>,
}

impl TrackingView {
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Some(LifecyclePhase::Completed)
    }

    pub fn has_fatal_error(&self) -> bool {
        self.error.as_ref().is_some_and(TrackingError::is_fatal)
    }

    pub fn timeline(&self) -> Vec<TimelineStep> {
        LifecyclePhase::timeline(self.phase)
    }
}

impl fmt::Display for TrackingView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = self.phase.map_or("LOADING", LifecyclePhase::wire_name);
        write!(f, "order {} [{}] {}%", self.order_id, phase, self.progress_percent)?;
        if let Some(point) = self.rendered_drone_point {
            write!(f, " drone at {point}")?;
        }
        if !self.live {
            f.write_str(" (offline)")?;
        }
        if let Some(message) = self.error_message() {
            write!(f, " error: {message}")?;
        }
        Ok(())
    }
}
