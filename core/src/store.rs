//! Storage traits and the error they share.
//!
//! Each trait covers one table group. Operations that must be atomic (guarded
//! cart upserts, order placement, cancellation) are single trait methods so the
//! implementation owns the transaction boundary.
//!
//! # Implementations
//!
//! - `PgStorefront` (in `storefront-postgres`): production implementation
//! - `InMemoryStorefront` (in `storefront-testing`): fast, deterministic testing
//!
//! # Dyn Compatibility
//!
//! Methods return [`StoreFuture`] instead of using `async fn` so the whole
//! store can be shared as `Arc<dyn Storefront>`.

use crate::cart::{CartItem, CartLine};
use crate::catalog::{CategorySummary, Product, ProductFilter};
use crate::checkout::{Coupon, OrderDraft};
use crate::dashboard::{DailyRevenue, DashboardCounts, RecentOrder};
use crate::ids::{CartItemId, OrderId, ProductId, UserId};
use crate::order::{Order, OrderStatus, PaymentStatus};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by every store method.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors that can occur during storage operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Row addressed by id does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Table or entity name
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// A conditional stock decrement found fewer units than needed.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Product whose stock ran short
        product_id: ProductId,
        /// Units the operation needed
        requested: u32,
        /// Units on hand when the guard failed
        available: u32,
    },

    /// The locked order row is not in a state that allows the change.
    #[error("Invalid order status transition from {from} to {to}")]
    InvalidTransition {
        /// Status found under lock
        from: OrderStatus,
        /// Status requested
        to: OrderStatus,
    },

    /// Payment status change not allowed from the current payment status.
    #[error("Invalid payment status transition from {from} to {to}")]
    InvalidPaymentTransition {
        /// Payment status found under lock
        from: PaymentStatus,
        /// Payment status requested
        to: PaymentStatus,
    },

    /// Order placement found no cart lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// The cart no longer holds the lines an order was priced from.
    #[error("Cart changed during checkout")]
    CartChanged,

    /// Write refused because of a referencing row or unique constraint.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database connection or query failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Shorthand for [`StoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Products and categories.
pub trait CatalogStore: Send + Sync {
    /// Load one product, active or not.
    fn product(&self, id: ProductId) -> StoreFuture<'_, Option<Product>>;

    /// List products matching `filter`, newest first.
    fn products<'a>(&'a self, filter: &'a ProductFilter) -> StoreFuture<'a, Vec<Product>>;

    /// Active categories with their active product counts, by name.
    fn categories(&self) -> StoreFuture<'_, Vec<CategorySummary>>;

    /// Overwrite the stock of a product. `None` when the product does not exist.
    fn set_stock(
        &self,
        id: ProductId,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Option<Product>>;

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown product, `Conflict` when any order line
    /// references it. The reference check and the delete are atomic.
    fn delete_product(&self, id: ProductId) -> StoreFuture<'_, ()>;
}

/// Cart lines.
pub trait CartStore: Send + Sync {
    /// All lines of a user's cart with their current products, oldest first.
    fn cart_lines(&self, user_id: UserId) -> StoreFuture<'_, Vec<CartLine>>;

    /// One line, only if it belongs to `user_id`.
    fn cart_line(&self, user_id: UserId, item_id: CartItemId)
    -> StoreFuture<'_, Option<CartLine>>;

    /// Quantity of `product_id` already in the cart, zero when absent.
    fn cart_quantity(&self, user_id: UserId, product_id: ProductId) -> StoreFuture<'_, u32>;

    /// Insert a line or add to the existing one.
    ///
    /// The write is guarded: it only happens while the product is active and
    /// the resulting quantity stays within both stock and the line maximum.
    /// Returns `None` when the guard rejected the write.
    fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Option<CartItem>>;

    /// Replace a line's quantity under the same guard as [`CartStore::add_to_cart`].
    fn set_cart_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Option<CartItem>>;

    /// Delete one line, returning it.
    fn remove_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> StoreFuture<'_, Option<CartItem>>;

    /// Delete every line, returning how many were removed.
    fn clear_cart(&self, user_id: UserId) -> StoreFuture<'_, u64>;

    /// Sum of quantities across the cart.
    fn cart_count(&self, user_id: UserId) -> StoreFuture<'_, u32>;
}

/// Orders and their lines.
pub trait OrderStore: Send + Sync {
    /// Persist a draft in one transaction.
    ///
    /// Locks the user's cart lines and checks them against the draft,
    /// allocates the order number, inserts header and items, decrements stock
    /// with a conditional update per line and deletes the ordered lines.
    ///
    /// # Errors
    ///
    /// `EmptyCart` when the cart was emptied concurrently, `CartChanged` when
    /// its locked lines differ from the draft, `InsufficientStock` when a
    /// decrement guard fails. Nothing is persisted in any of these cases.
    fn place_order(&self, draft: OrderDraft) -> StoreFuture<'_, Order>;

    /// Load an order with its items.
    fn order(&self, id: OrderId) -> StoreFuture<'_, Option<Order>>;

    /// A user's orders, newest first.
    fn orders_for_user(&self, user_id: UserId) -> StoreFuture<'_, Vec<Order>>;

    /// Cancel under a row lock, restoring every item's quantity to stock.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `InvalidTransition` when the order is shipped, delivered
    /// or already cancelled.
    fn cancel_order(
        &self,
        id: OrderId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order>;

    /// Move the order to `to`, which must be the next step of its lifecycle.
    fn update_order_status(
        &self,
        id: OrderId,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order>;

    /// Change the payment status, validated under lock.
    fn update_payment_status(
        &self,
        id: OrderId,
        to: PaymentStatus,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order>;
}

/// Wishlist membership.
pub trait WishlistStore: Send + Sync {
    /// Products in the wishlist, most recently added first.
    fn wishlist(&self, user_id: UserId) -> StoreFuture<'_, Vec<Product>>;

    /// Whether the pair exists.
    fn wishlist_contains(&self, user_id: UserId, product_id: ProductId) -> StoreFuture<'_, bool>;

    /// Insert the pair. `false` when it already existed.
    fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool>;

    /// Delete the pair. `false` when it did not exist.
    fn remove_from_wishlist(&self, user_id: UserId, product_id: ProductId)
    -> StoreFuture<'_, bool>;
}

/// Coupon lookup.
pub trait CouponStore: Send + Sync {
    /// Find a coupon by code, ignoring case and surrounding whitespace.
    fn coupon<'a>(&'a self, code: &'a str) -> StoreFuture<'a, Option<Coupon>>;
}

/// Aggregates behind the admin dashboard.
pub trait DashboardQueries: Send + Sync {
    /// Headline counts.
    fn dashboard_counts(&self) -> StoreFuture<'_, DashboardCounts>;

    /// Newest orders first.
    fn recent_orders(&self, limit: u32) -> StoreFuture<'_, Vec<RecentOrder>>;

    /// Products with `stock_quantity <= min_stock`, lowest stock first.
    fn low_stock_products(&self, limit: u32) -> StoreFuture<'_, Vec<Product>>;

    /// Every category with its product count, by name.
    fn category_counts(&self) -> StoreFuture<'_, Vec<CategorySummary>>;

    /// Revenue per UTC day for non-cancelled orders placed at or after `since`.
    /// Days without orders are omitted.
    fn daily_revenue(&self, since: DateTime<Utc>) -> StoreFuture<'_, Vec<DailyRevenue>>;
}

/// Everything the services need from storage.
pub trait Storefront:
    CatalogStore + CartStore + OrderStore + WishlistStore + CouponStore + DashboardQueries
{
    /// Cheap round trip used by readiness checks.
    fn ping(&self) -> StoreFuture<'_, ()>;
}
