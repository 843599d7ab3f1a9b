//! Order Records
//!
//! An order is created by the shop's checkout pipeline with
//! `status = paid, delivered = false`. This service only ever acts on an
//! order in that state, and the only transition it makes is to
//! `status = delivered, delivered = true`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle status of an order as stored remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created but not yet paid.
    Pending,
    /// Paid and awaiting fulfillment.
    Paid,
    /// Command dispatched and acknowledged.
    Delivered,
    /// Any status this service does not recognise.
    #[default]
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Parse a status string, ignoring case. Unrecognised values map to
    /// [`OrderStatus::Unknown`].
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pending" => Self::Pending,
            "paid" => Self::Paid,
            "delivered" => Self::Delivered,
            _ => Self::Unknown,
        }
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Delivered => "delivered",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order Record
// =============================================================================

/// A paid purchase awaiting fulfillment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    /// Identifier assigned by the store. Never empty.
    pub id: String,
    /// In-game name of the buyer.
    pub buyer: String,
    /// Product label shown in the shop.
    pub product: String,
    /// Command to run on the host, verbatim.
    pub command: String,
    /// Stored status.
    pub status: OrderStatus,
    /// Stored delivered flag.
    pub delivered: bool,
    /// Creation time, when the store reports one.
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderRecord {
    /// Create a paid, undelivered order.
    #[must_use]
    pub fn paid(
        id: impl Into<String>,
        buyer: impl Into<String>,
        product: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            buyer: buyer.into(),
            product: product.into(),
            command: command.into(),
            status: OrderStatus::Paid,
            delivered: false,
            created_at: None,
        }
    }

    /// Set the status.
    #[must_use]
    pub const fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the delivered flag.
    #[must_use]
    pub const fn with_delivered(mut self, delivered: bool) -> Self {
        self.delivered = delivered;
        self
    }

    /// Set the creation time.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Whether the order may be acted upon: paid and not yet delivered.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Paid && !self.delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("paid", OrderStatus::Paid)]
    #[test_case("PAID", OrderStatus::Paid)]
    #[test_case(" delivered ", OrderStatus::Delivered)]
    #[test_case("pending", OrderStatus::Pending)]
    #[test_case("refunded", OrderStatus::Unknown)]
    #[test_case("", OrderStatus::Unknown)]
    fn status_parsing(input: &str, expected: OrderStatus) {
        assert_eq!(OrderStatus::from_str_case_insensitive(input), expected);
    }

    #[test]
    fn status_serde_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Delivered).unwrap(),
            "\"delivered\""
        );
        let unknown: OrderStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(unknown, OrderStatus::Unknown);
    }

    #[test]
    fn paid_undelivered_order_is_pending() {
        let order = OrderRecord::paid("o1", "Steve", "VIP", "lp user Steve parent add vip");
        assert!(order.is_pending());
    }

    #[test]
    fn delivered_flag_or_status_excludes_order() {
        let base = OrderRecord::paid("o1", "Steve", "VIP", "say hi");
        assert!(!base.clone().with_delivered(true).is_pending());
        assert!(!base.clone().with_status(OrderStatus::Delivered).is_pending());
        assert!(!base.with_status(OrderStatus::Pending).is_pending());
    }
}
