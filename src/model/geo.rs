//! Coordinates and straight-line interpolation between them.

use serde::{Deserialize, Serialize};

/// Offset (in degrees, on both axes) applied to the end of a zero-length path.
pub const DEGENERATE_PATH_OFFSET: f64 = 0.01;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lng)
    }
}

/// End point of the drawn path from `start` to `end`.
///
/// Identical points are moved apart by [`DEGENERATE_PATH_OFFSET`] so the map still has a
/// segment to draw. Only rendering uses this; completion never looks at distances.
pub fn path_end(start: GeoPoint, end: GeoPoint) -> GeoPoint {
    if start == end {
        GeoPoint::new(
            end.lat + DEGENERATE_PATH_OFFSET,
            end.lng + DEGENERATE_PATH_OFFSET,
        )
    } else {
        end
    }
}

/// Position along the straight line from `start` to `end` at `progress_percent`.
///
/// The percent is clamped to `0..=100`. At 0 the result is exactly `start` and at 100 exactly
/// the path end (see [`path_end`]), with no floating point drift.
///
/// Returns `None` when the input is not renderable: a non-finite coordinate or a NaN percent.
pub fn interpolate(start: GeoPoint, end: GeoPoint, progress_percent: f64) -> Option<GeoPoint> {
    if !start.is_finite() || !end.is_finite() || progress_percent.is_nan() {
        return None;
    }

    let end = path_end(start, end);
    let t = progress_percent.clamp(0.0, 100.0) / 100.0;

    if t == 0.0 {
        return Some(start);
    }
    if t == 1.0 {
        return Some(end);
    }

    Some(GeoPoint::new(
        start.lat + (end.lat - start.lat) * t,
        start.lng + (end.lng - start.lng) * t,
    ))
}
