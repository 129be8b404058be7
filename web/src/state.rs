//! Application state for Axum handlers.

use std::sync::Arc;
use storefront_core::store::Storefront;
use storefront_runtime::Environment;
use storefront_runtime::services::{
    CartService, CatalogService, DashboardService, OrderService, WishlistService,
};

/// Services shared across all HTTP handlers.
///
/// Built once from an [`Environment`]; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Cart operations
    pub cart: CartService,
    /// Checkout and order lifecycle
    pub orders: OrderService,
    /// Catalog browsing and admin stock changes
    pub catalog: CatalogService,
    /// Wishlist membership
    pub wishlist: WishlistService,
    /// Admin dashboard
    pub dashboard: DashboardService,
    /// Store handle for readiness checks
    pub store: Arc<dyn Storefront>,
}

impl AppState {
    /// Build every service over the same environment.
    #[must_use]
    pub fn new(env: &Environment) -> Self {
        Self {
            cart: CartService::new(env.clone()),
            orders: OrderService::new(env.clone()),
            catalog: CatalogService::new(env.clone()),
            wishlist: WishlistService::new(env.clone()),
            dashboard: DashboardService::new(env.clone()),
            store: Arc::clone(&env.store),
        }
    }
}
