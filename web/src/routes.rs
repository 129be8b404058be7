//! Router configuration.

use crate::handlers::{admin, cart, catalog, health, orders, wishlist};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::compression::CompressionLayer;

/// Build the complete router.
///
/// Every route runs behind the correlation-id middleware; responses are
/// gzip-compressed when the client accepts it.
pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/dashboard/clear-cache", post(admin::clear_dashboard_cache))
        .route("/orders/:id/status", post(admin::update_order_status))
        .route("/orders/:id/payment-status", post(admin::update_payment_status))
        .route("/orders/:id/cancel", post(admin::cancel_order))
        .route("/products/:id/stock", post(admin::set_stock))
        .route("/products/:id", delete(admin::delete_product));

    Router::new()
        // Health checks
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Catalog
        .route("/products", get(catalog::list_products))
        .route("/products/:id", get(catalog::get_product))
        .route("/categories", get(catalog::list_categories))
        // Cart
        .route("/cart", get(cart::show_cart))
        .route("/cart/count", get(cart::cart_count))
        .route("/cart/add", post(cart::add_item))
        .route("/cart/update", post(cart::update_item))
        .route("/cart/remove", post(cart::remove_item))
        .route("/cart/clear", post(cart::clear_cart))
        // Checkout and orders
        .route("/checkout", post(orders::checkout))
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        // Wishlist
        .route("/wishlist", get(wishlist::list_wishlist))
        .route("/wishlist/toggle", post(wishlist::toggle_wishlist))
        .nest("/admin", admin_routes)
        .layer(correlation_id_layer())
        .layer(CompressionLayer::new())
        .with_state(state)
}
