//! Storefront services.
//!
//! Every service is a thin, cloneable handle over an [`Environment`]. Services
//! read and write through the store traits, keep the cache consistent and
//! publish a domain event after each successful mutation.
//!
//! [`Environment`]: crate::Environment

mod cart;
mod catalog;
pub mod dashboard;
mod orders;
mod wishlist;

pub use cart::{CartService, cart_count_key};
pub use catalog::CatalogService;
pub use dashboard::DashboardService;
pub use orders::OrderService;
pub use wishlist::WishlistService;
