//! # Storefront Core
//!
//! Domain types, business rules and storage traits for the storefront.
//!
//! This crate performs no I/O. Pricing, cart guards, checkout planning, the
//! order status machine, the cache tag taxonomy and the dashboard series are
//! plain functions over plain data; everything effectful sits behind a trait
//! implemented by another crate.
//!
//! ## Modules
//!
//! - [`catalog`]: products, categories, listing filters
//! - [`cart`]: cart lines and the add/update guards
//! - [`checkout`]: addresses, shipping, coupons, order drafts
//! - [`order`]: orders and their status machines
//! - [`wishlist`]: wishlist errors
//! - [`dashboard`]: admin aggregates and the revenue series
//! - [`cache`]: cache backend trait and tag taxonomy
//! - [`event`]: domain events and observers
//! - [`store`]: storage traits and [`store::StoreError`]
//! - [`environment`]: injected dependencies such as the clock
//!
//! ## Example
//!
//! ```
//! use storefront_core::cart::{check_add, CartError};
//! # fn product() -> storefront_core::catalog::Product { unimplemented!() }
//!
//! fn add_two(existing: u32) -> Result<u32, CartError> {
//!     let p = product();
//!     check_add(&p, existing, 2)
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod cache;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod dashboard;
pub mod event;
pub mod ids;
pub mod money;
pub mod order;
pub mod store;
pub mod wishlist;

pub use ids::{CartItemId, CategoryId, OrderId, OrderItemId, ProductId, UserId};
pub use money::Money;

/// Environment module - injected dependencies.
///
/// Services never call `Utc::now()` directly; they ask the [`environment::Clock`]
/// they were built with so tests can pin time.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use storefront_core::environment::{Clock, SystemClock};
    ///
    /// let now = SystemClock.now();
    /// assert!(now.timestamp() > 0);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
