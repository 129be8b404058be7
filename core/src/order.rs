//! Orders, their frozen line snapshots and the status machines.
//!
//! ```text
//! pending ─▶ confirmed ─▶ processing ─▶ shipped ─▶ delivered
//!    │           │             │
//!    └───────────┴─────────────┴──▶ cancelled
//! ```

use crate::checkout::Address;
use crate::ids::{OrderId, OrderItemId, ProductId, UserId};
use crate::money::Money;
use crate::store::StoreError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fulfilment status of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, awaiting confirmation
    Pending,
    /// Confirmed by the shop
    Confirmed,
    /// Being prepared
    Processing,
    /// Handed to the carrier
    Shipped,
    /// Received by the customer
    Delivered,
    /// Cancelled, stock restored (terminal)
    Cancelled,
}

impl OrderStatus {
    /// Database and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// The step after this one in the fulfilment flow.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::Processing),
            Self::Processing => Some(Self::Shipped),
            Self::Shipped => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled => None,
        }
    }

    /// Cancellation is allowed until the order ships.
    #[must_use]
    pub const fn can_cancel(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Processing)
    }

    /// Whether moving from `self` to `to` is a legal single step.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        if to == Self::Cancelled {
            return self.can_cancel();
        }
        self.next() == Some(to)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Payment state of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Not paid yet
    Pending,
    /// Payment captured
    Paid,
    /// Payment attempt failed
    Failed,
    /// Payment returned to the customer
    Refunded,
}

impl PaymentStatus {
    /// Database and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    /// Refunds need a captured payment; a refund is final.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        match (self, to) {
            (Self::Refunded, _) | (Self::Pending | Self::Failed, Self::Refunded) => false,
            _ => true,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A status string that is not part of either status machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// Human-readable order number: `ORD-YYYYMMDD-NNNN`.
#[must_use]
pub fn order_number(date: NaiveDate, sequence: u32) -> String {
    format!("ORD-{}-{sequence:04}", date.format("%Y%m%d"))
}

/// Line of an order. Name, SKU and price are copied from the product when the
/// order is placed and never change afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Line identifier
    pub id: OrderItemId,
    /// Owning order
    pub order_id: OrderId,
    /// Product the line was created from
    pub product_id: ProductId,
    /// Product name at order time
    pub product_name: String,
    /// SKU at order time
    pub sku: String,
    /// Effective unit price at order time
    pub unit_price: Money,
    /// Units ordered
    pub quantity: u32,
    /// `unit_price × quantity`
    pub line_total: Money,
}

/// A placed order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier
    pub id: OrderId,
    /// `ORD-YYYYMMDD-NNNN`
    pub order_number: String,
    /// Customer
    pub user_id: UserId,
    /// Fulfilment status
    pub status: OrderStatus,
    /// Payment status
    pub payment_status: PaymentStatus,
    /// Sum of line totals
    pub subtotal: Money,
    /// Shipping cost
    pub shipping_cost: Money,
    /// Coupon discount
    pub discount: Money,
    /// Amount charged
    pub total: Money,
    /// Coupon applied, normalised to upper case
    pub coupon_code: Option<String>,
    /// Shipping address snapshot
    pub shipping_address: Address,
    /// Billing address snapshot
    pub billing_address: Address,
    /// Customer notes
    pub notes: Option<String>,
    /// Cancellation reason
    pub cancellation_reason: Option<String>,
    /// When the order was cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Frozen lines
    pub items: Vec<OrderItem>,
    /// Placement time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Total recomputed from the persisted lines.
    ///
    /// Always equal to [`Order::total`] for orders written by this crate.
    #[must_use]
    pub fn recomputed_total(&self) -> Money {
        let subtotal: Money = self.items.iter().map(|i| i.unit_price.times(i.quantity)).sum();
        (subtotal + self.shipping_cost).saturating_sub(self.discount)
    }

    /// Units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Order operation failures.
#[derive(Error, Debug)]
pub enum OrderError {
    /// No such order, or it belongs to another user
    #[error("Order {0} not found")]
    NotFound(OrderId),

    /// Status change not allowed from the current status
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    /// Payment status change not allowed
    #[error("Cannot change payment status from {from} to {to}")]
    InvalidPaymentTransition {
        /// Current payment status
        from: PaymentStatus,
        /// Requested payment status
        to: PaymentStatus,
    },

    /// Storage failure
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            StoreError::InvalidPaymentTransition { from, to } => {
                Self::InvalidPaymentTransition { from, to }
            }
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn status_advances_one_step_at_a_time() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn cancellation_stops_at_shipping() {
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn refund_requires_paid() {
        assert!(PaymentStatus::Paid.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Failed.can_transition_to(PaymentStatus::Paid));
    }

    #[test]
    fn statuses_parse_their_own_representation() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn order_number_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(order_number(date, 42), "ORD-20240307-0042");
    }

    #[test]
    fn store_transition_errors_become_order_errors() {
        let err: OrderError = StoreError::InvalidTransition {
            from: OrderStatus::Cancelled,
            to: OrderStatus::Cancelled,
        }
        .into();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }
}
