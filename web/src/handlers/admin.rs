//! Admin endpoints: dashboard, order lifecycle and stock.
//!
//! Access control is enforced by the gateway in front of `/admin`.

use crate::error::AppError;
use crate::extractors::OptionalJson;
use crate::flash::{self, Flash, FlashRedirect};
use crate::handlers::orders::CancelRequest;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use storefront_core::catalog::Product;
use storefront_core::dashboard::DashboardData;
use storefront_core::order::{Order, OrderStatus, PaymentStatus};
use storefront_core::{OrderId, ProductId};

/// Dashboard payload plus any pending flash message.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    /// Message left by the previous redirect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<Flash>,
    /// Aggregates
    #[serde(flatten)]
    pub data: DashboardData,
}

/// Dashboard aggregates, cached per section.
pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let data = state.dashboard.data().await?;
    let flash = Flash::from_headers(&headers);
    let consumed = flash.is_some();

    let mut response = Json(DashboardResponse { flash, data }).into_response();
    if consumed {
        response
            .headers_mut()
            .insert(header::SET_COOKIE, flash::clear_cookie());
    }
    Ok(response)
}

/// Drop every cached dashboard section and go back to the dashboard.
pub async fn clear_dashboard_cache(State(state): State<AppState>) -> FlashRedirect {
    state.dashboard.clear_cache().await;
    FlashRedirect::to(
        "/admin/dashboard",
        Flash::success("Dashboard cache cleared successfully"),
    )
}

/// Request body of `POST /admin/orders/:id/status`.
#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    /// Target status; omitted means the next lifecycle step
    pub status: Option<OrderStatus>,
}

/// Move an order to `status`, or one step forward when the body is empty.
///
/// A body that names no known status is rejected; it never advances the order.
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    OptionalJson(request): OptionalJson<StatusRequest>,
) -> Result<Json<Order>, AppError> {
    let order = match request.and_then(|r| r.status) {
        Some(to) => state.orders.update_status(order_id, to).await?,
        None => state.orders.advance_status(order_id).await?,
    };
    Ok(Json(order))
}

/// Request body of `POST /admin/orders/:id/payment-status`.
#[derive(Debug, Deserialize)]
pub struct PaymentStatusRequest {
    /// Target payment status
    pub payment_status: PaymentStatus,
}

/// Change an order's payment status.
pub async fn update_payment_status(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    Json(request): Json<PaymentStatusRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(
        state
            .orders
            .set_payment_status(order_id, request.payment_status)
            .await?,
    ))
}

/// Cancel any order on behalf of the shop.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    OptionalJson(request): OptionalJson<CancelRequest>,
) -> Result<Json<Order>, AppError> {
    let reason = request.and_then(|r| r.reason);
    Ok(Json(state.orders.cancel(order_id, reason).await?))
}

/// Request body of `POST /admin/products/:id/stock`.
#[derive(Debug, Deserialize)]
pub struct StockRequest {
    /// New stock level
    pub quantity: u32,
}

/// Overwrite a product's stock.
pub async fn set_stock(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Json(request): Json<StockRequest>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(
        state.catalog.set_stock(product_id, request.quantity).await?,
    ))
}

/// Delete a product no order references.
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_product(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
