//! Domain events and the observer seam.
//!
//! Services publish a [`DomainEvent`] after each successful mutation. Observers
//! run outside the operation that produced the event, so an observer failure
//! never undoes business state.
//!
//! # Example
//!
//! ```
//! use storefront_core::event::{DomainEvent, DomainObserver};
//!
//! struct Counter(std::sync::atomic::AtomicUsize);
//!
//! impl DomainObserver for Counter {
//!     fn name(&self) -> &'static str {
//!         "counter"
//!     }
//!
//!     fn observe(&self, _event: &DomainEvent) {
//!         self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!     }
//! }
//! ```

use crate::ids::{CartItemId, OrderId, ProductId, UserId};
use crate::money::Money;
use crate::order::{OrderStatus, PaymentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Something that happened to a cart or an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    /// Units added to a cart line (new or existing)
    CartItemAdded {
        /// Cart owner
        user_id: UserId,
        /// Line written
        item_id: CartItemId,
        /// Product added
        product_id: ProductId,
        /// Units added by this call
        quantity: u32,
        /// Line quantity afterwards
        line_quantity: u32,
        /// When
        at: DateTime<Utc>,
    },
    /// A line's quantity replaced
    CartItemUpdated {
        /// Cart owner
        user_id: UserId,
        /// Line written
        item_id: CartItemId,
        /// Product of the line
        product_id: ProductId,
        /// Quantity before
        old_quantity: u32,
        /// Quantity after
        new_quantity: u32,
        /// When
        at: DateTime<Utc>,
    },
    /// A line deleted
    CartItemRemoved {
        /// Cart owner
        user_id: UserId,
        /// Line deleted
        item_id: CartItemId,
        /// Product of the line
        product_id: ProductId,
        /// Quantity the line held
        quantity: u32,
        /// When
        at: DateTime<Utc>,
    },
    /// Every line deleted
    CartCleared {
        /// Cart owner
        user_id: UserId,
        /// Number of lines removed
        removed: u64,
        /// When
        at: DateTime<Utc>,
    },
    /// Cart converted into an order
    OrderPlaced {
        /// New order
        order_id: OrderId,
        /// Its number
        order_number: String,
        /// Customer
        user_id: UserId,
        /// Amount charged
        total: Money,
        /// Units ordered
        item_count: u32,
        /// When
        at: DateTime<Utc>,
    },
    /// Order cancelled and stock restored
    OrderCancelled {
        /// Cancelled order
        order_id: OrderId,
        /// Its number
        order_number: String,
        /// Customer
        user_id: UserId,
        /// Reason given
        reason: Option<String>,
        /// Units returned to stock
        restored_units: u32,
        /// When
        at: DateTime<Utc>,
    },
    /// Fulfilment status advanced
    OrderStatusChanged {
        /// Order
        order_id: OrderId,
        /// Its number
        order_number: String,
        /// Status before
        from: OrderStatus,
        /// Status after
        to: OrderStatus,
        /// When
        at: DateTime<Utc>,
    },
    /// Payment status changed
    PaymentStatusChanged {
        /// Order
        order_id: OrderId,
        /// Its number
        order_number: String,
        /// Payment status before
        from: PaymentStatus,
        /// Payment status after
        to: PaymentStatus,
        /// When
        at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Stable event type name with version suffix.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::CartItemAdded { .. } => "CartItemAdded.v1",
            Self::CartItemUpdated { .. } => "CartItemUpdated.v1",
            Self::CartItemRemoved { .. } => "CartItemRemoved.v1",
            Self::CartCleared { .. } => "CartCleared.v1",
            Self::OrderPlaced { .. } => "OrderPlaced.v1",
            Self::OrderCancelled { .. } => "OrderCancelled.v1",
            Self::OrderStatusChanged { .. } => "OrderStatusChanged.v1",
            Self::PaymentStatusChanged { .. } => "PaymentStatusChanged.v1",
        }
    }

    /// When the event happened.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::CartItemAdded { at, .. }
            | Self::CartItemUpdated { at, .. }
            | Self::CartItemRemoved { at, .. }
            | Self::CartCleared { at, .. }
            | Self::OrderPlaced { at, .. }
            | Self::OrderCancelled { at, .. }
            | Self::OrderStatusChanged { at, .. }
            | Self::PaymentStatusChanged { at, .. } => *at,
        }
    }

    /// True for the four cart events.
    #[must_use]
    pub const fn is_cart_event(&self) -> bool {
        matches!(
            self,
            Self::CartItemAdded { .. }
                | Self::CartItemUpdated { .. }
                | Self::CartItemRemoved { .. }
                | Self::CartCleared { .. }
        )
    }
}

/// Receives every published event.
///
/// Observers are registered once at startup and called from the audit worker,
/// never from the request that caused the event.
pub trait DomainObserver: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Handle one event. Must not block for long.
    fn observe(&self, event: &DomainEvent);
}

/// Publishes events. Implemented by the audit queue; publishing never fails.
pub trait EventPublisher: Send + Sync {
    /// Hand an event over for asynchronous observation.
    fn publish(&self, event: DomainEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_are_versioned() {
        let event = DomainEvent::CartCleared {
            user_id: UserId::new(),
            removed: 3,
            at: Utc::now(),
        };
        assert_eq!(event.event_type(), "CartCleared.v1");
        assert!(event.is_cart_event());
    }

    #[test]
    fn order_events_are_not_cart_events() {
        let event = DomainEvent::OrderStatusChanged {
            order_id: OrderId::new(),
            order_number: "ORD-20240101-0001".to_string(),
            from: OrderStatus::Pending,
            to: OrderStatus::Confirmed,
            at: Utc::now(),
        };
        assert!(!event.is_cart_event());
    }
}
