//! Order store wire format.
//!
//! The store answers a read with a JSON array of flat objects:
//!
//! ```json
//! [{"id":"o1","mc_username":"Steve","product":"VIP",
//!   "command":"lp user Steve parent add vip","status":"paid","delivered":false}]
//! ```
//!
//! Each element is decoded on its own so one bad record never costs the
//! rest of the batch. Unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::ports::{FetchError, ParseError};
use crate::domain::order::{OrderRecord, OrderStatus};

/// Body of the delivered acknowledgment.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeliveredUpdate {
    /// Always `true`.
    pub delivered: bool,
    /// Always [`OrderStatus::Delivered`].
    pub status: OrderStatus,
}

impl DeliveredUpdate {
    /// The only update this service ever writes.
    pub const DELIVERED: Self = Self {
        delivered: true,
        status: OrderStatus::Delivered,
    };
}

/// Order identifiers are text in the store, but integer keys are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(serde_json::Number),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

/// One order as the store sends it.
#[derive(Debug, Deserialize)]
struct WireOrder {
    #[serde(default)]
    id: Option<WireId>,
    #[serde(default)]
    mc_username: Option<String>,
    #[serde(default)]
    product: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    delivered: Option<bool>,
    #[serde(default)]
    created_at: Option<String>,
}

impl WireOrder {
    fn into_record(self, index: usize) -> Result<OrderRecord, ParseError> {
        let id = self
            .id
            .map(WireId::into_string)
            .filter(|id| !id.trim().is_empty())
            .ok_or(ParseError::MissingId { index })?;

        // Absent filter columns are vouched for by the query itself.
        let status = self
            .status
            .as_deref()
            .map_or(OrderStatus::Paid, OrderStatus::from_str_case_insensitive);

        Ok(OrderRecord {
            id,
            buyer: self.mc_username.unwrap_or_default(),
            product: self.product.unwrap_or_default(),
            command: self.command.unwrap_or_default(),
            status,
            delivered: self.delivered.unwrap_or(false),
            created_at: self.created_at.as_deref().and_then(parse_timestamp),
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Decoded batch: the usable records and the ones that were dropped.
#[derive(Debug, Default)]
pub struct DecodedOrders {
    /// Well-formed records, in response order.
    pub orders: Vec<OrderRecord>,
    /// One entry per dropped record.
    pub errors: Vec<ParseError>,
}

/// Decode a read response body.
///
/// # Errors
///
/// Returns [`FetchError::Decode`] if the body is not a JSON array. Problems
/// with individual elements are reported in [`DecodedOrders::errors`].
pub fn decode_orders(body: &str) -> Result<DecodedOrders, FetchError> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    let mut decoded = DecodedOrders {
        orders: Vec::with_capacity(values.len()),
        errors: Vec::new(),
    };

    for (index, value) in values.into_iter().enumerate() {
        let record = serde_json::from_value::<WireOrder>(value)
            .map_err(|e| ParseError::Malformed {
                index,
                reason: e.to_string(),
            })
            .and_then(|wire| wire.into_record(index));

        match record {
            Ok(order) => decoded.orders.push(order),
            Err(e) => decoded.errors.push(e),
        }
    }

    Ok(decoded)
}
