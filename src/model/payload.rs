//! Wire format of the order service and its validation into [`OrderSnapshot`].
//!
//! The server sends loosely shaped JSON: the id arrives as `id` or `_id`, most fields can be
//! missing, and the phase is a free-form string. Everything here is checked once at the edge
//! so the rest of the crate only ever sees a validated [`OrderSnapshot`].

use crate::model::geo::GeoPoint;
use crate::model::order::{LineItem, OrderId, OrderSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating a server payload.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PayloadError {
    /// The order identifier is empty or malformed.
    #[error("Invalid order identifier: {0:?}")]
    InvalidOrderId(String),

    /// The payload carries no identifier at all.
    #[error("Order payload has no id")]
    MissingId,

    /// The phase string is not one of the known lifecycle phases.
    #[error("Unknown order phase: {0}")]
    UnknownPhase(String),

    /// A line item has a negative or out-of-range quantity.
    #[error("Invalid quantity {quantity} for item {name}")]
    InvalidQuantity { name: String, quantity: i64 },

    /// A monetary amount is negative or not a number.
    #[error("Invalid amount for {field}: {value}")]
    InvalidAmount { field: String, value: f64 },

    /// The body is not valid JSON for an order.
    #[error("Malformed order JSON: {0}")]
    Json(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPayload {
    #[serde(default)]
    pub menu_item_id: Option<String>,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
}

/// Order exactly as the server sends it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderPayload {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub restaurant_id: Option<String>,
    #[serde(default)]
    pub drone_id: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemPayload>,
    #[serde(default)]
    pub total: f64,
    pub status: String,
    #[serde(default)]
    pub delivery_lat: Option<f64>,
    #[serde(default)]
    pub delivery_lon: Option<f64>,
    #[serde(default)]
    pub drone_lat: Option<f64>,
    #[serde(default)]
    pub drone_lon: Option<f64>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Answer of `POST /orders/{id}/complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionPayload {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub order: Option<OrderPayload>,
}

fn amount(field: &str, value: f64) -> Result<f64, PayloadError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(PayloadError::InvalidAmount {
            field: field.to_string(),
            value,
        })
    }
}

fn point(lat: Option<f64>, lng: Option<f64>) -> Option<GeoPoint> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
        _ => None,
    }
}

impl TryFrom<ItemPayload> for LineItem {
    type Error = PayloadError;

    fn try_from(item: ItemPayload) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(item.quantity).map_err(|_| PayloadError::InvalidQuantity {
            name: item.name.clone(),
            quantity: item.quantity,
        })?;
        Ok(LineItem {
            unit_price: amount(&item.name, item.price)?,
            menu_item_id: item.menu_item_id,
            name: item.name,
            quantity,
        })
    }
}

impl TryFrom<OrderPayload> for OrderSnapshot {
    type Error = PayloadError;

    fn try_from(payload: OrderPayload) -> Result<Self, Self::Error> {
        let id = payload.id.as_deref().ok_or(PayloadError::MissingId)?;
        let items = payload
            .items
            .into_iter()
            .map(LineItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderSnapshot {
            id: OrderId::parse(id)?,
            phase: payload.status.parse()?,
            total: amount("total", payload.total)?,
            items,
            destination: point(payload.delivery_lat, payload.delivery_lon),
            drone: point(payload.drone_lat, payload.drone_lon),
            delivery_address: payload.delivery_address,
            drone_id: payload.drone_id,
            updated_at: payload.updated_at,
        })
    }
}

impl From<&OrderSnapshot> for OrderPayload {
    fn from(snapshot: &OrderSnapshot) -> Self {
        OrderPayload {
            id: Some(snapshot.id.to_string()),
            drone_id: snapshot.drone_id.clone(),
            items: snapshot
                .items
                .iter()
                .map(|item| ItemPayload {
                    menu_item_id: item.menu_item_id.clone(),
                    name: item.name.clone(),
                    price: item.unit_price,
                    quantity: i64::from(item.quantity),
                })
                .collect(),
            total: snapshot.total,
            status: snapshot.phase.wire_name().to_string(),
            delivery_lat: snapshot.destination.map(|p| p.lat),
            delivery_lon: snapshot.destination.map(|p| p.lng),
            drone_lat: snapshot.drone.map(|p| p.lat),
            drone_lon: snapshot.drone.map(|p| p.lng),
            delivery_address: snapshot.delivery_address.clone(),
            updated_at: snapshot.updated_at.clone(),
            ..OrderPayload::default()
        }
    }
}

/// Parses and validates one JSON order document.
pub fn decode_snapshot(text: &str) -> Result<OrderSnapshot, PayloadError> {
    let payload: OrderPayload =
        serde_json::from_str(text).map_err(|e| PayloadError::Json(e.to_string()))?;
    OrderSnapshot::try_from(payload)
}
