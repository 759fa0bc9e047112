use crate::model::geo::GeoPoint;
use crate::model::payload::PayloadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest identifier accepted by [`OrderId::parse`].
pub const MAX_ORDER_ID_LEN: usize = 64;

/// Validated order identifier.
///
/// Non-empty after trimming, at most [`MAX_ORDER_ID_LEN`] characters, ASCII letters, digits,
/// `-` and `_` only. Anything else is rejected before a request or subscription is made.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= MAX_ORDER_ID_LEN
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(PayloadError::InvalidOrderId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle phase of an order, in server order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum LifecyclePhase {
    Pending,
    Preparing,
    ReadyForPickup,
    Delivering,
    Completed,
}

/// Phases shown on the customer-facing progress timeline.
pub const TIMELINE: [LifecyclePhase; 4] = [
    LifecyclePhase::Pending,
    LifecyclePhase::Preparing,
    LifecyclePhase::Delivering,
    LifecyclePhase::Completed,
];

impl LifecyclePhase {
    pub fn ordinal(self) -> u8 {
        match self {
            LifecyclePhase::Pending => 0,
            LifecyclePhase::Preparing => 1,
            LifecyclePhase::ReadyForPickup => 2,
            LifecyclePhase::Delivering => 3,
            LifecyclePhase::Completed => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LifecyclePhase::Pending => "Pending",
            LifecyclePhase::Preparing => "Preparing",
            LifecyclePhase::ReadyForPickup => "Ready for Pickup",
            LifecyclePhase::Delivering => "Delivering",
            LifecyclePhase::Completed => "Completed",
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            LifecyclePhase::Pending => "PENDING",
            LifecyclePhase::Preparing => "PREPARING",
            LifecyclePhase::ReadyForPickup => "READY_FOR_PICKUP",
            LifecyclePhase::Delivering => "DELIVERING",
            LifecyclePhase::Completed => "COMPLETED",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == LifecyclePhase::Completed
    }

    /// Timeline steps with a `reached` flag relative to `current`.
    pub fn timeline(current: Option<LifecyclePhase>) -> Vec<TimelineStep> {
        TIMELINE
            .iter()
            .map(|&phase| TimelineStep {
                phase,
                label: phase.label(),
                reached: current.is_some_and(|c| c.ordinal() >= phase.ordinal()),
            })
            .collect()
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for LifecyclePhase {
    type Err = PayloadError;

    /// Case and separator insensitive: `ready_for_pickup`, `Ready for Pickup` and
    /// `READY-FOR-PICKUP` all parse. Unknown phases are rejected.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "PENDING" => Ok(LifecyclePhase::Pending),
            "PREPARING" => Ok(LifecyclePhase::Preparing),
            "READYFORPICKUP" => Ok(LifecyclePhase::ReadyForPickup),
            "DELIVERING" => Ok(LifecyclePhase::Delivering),
            "COMPLETED" => Ok(LifecyclePhase::Completed),
            _ => Err(PayloadError::UnknownPhase(raw.to_string())),
        }
    }
}

impl TryFrom<String> for LifecyclePhase {
    type Error = PayloadError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineStep {
    pub phase: LifecyclePhase,
    pub label: &'static str,
    pub reached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub menu_item_id: Option<String>,
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
}

impl LineItem {
    pub fn line_total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// One full, server-authoritative description of an order.
///
/// Snapshots are immutable; a newer one replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub phase: LifecyclePhase,
    pub total: f64,
    pub items: Vec<LineItem>,
    pub destination: Option<GeoPoint>,
    pub drone: Option<GeoPoint>,
    pub delivery_address: Option<String>,
    pub drone_id: Option<String>,
    pub updated_at: Option<String>,
}

impl OrderSnapshot {
    pub fn items_subtotal(&self) -> f64 {
        self.items.iter().map(LineItem::line_total).sum()
    }

    /// Same order, moved to `phase`.
    pub fn with_phase(&self, phase: LifecyclePhase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }
}
