//! Checkout and customer order endpoints.
//!
//! - `POST /checkout` - place an order from the cart (form post, redirects)
//! - `GET /orders` - the user's orders, newest first
//! - `GET /orders/:id` - one of the user's orders
//! - `POST /orders/:id/cancel` - cancel one of the user's orders

use crate::error::AppError;
use crate::extractors::{CurrentUser, OptionalJson};
use crate::flash::{Flash, FlashRedirect};
use crate::state::AppState;
use axum::{
    Form, Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use storefront_core::OrderId;
use storefront_core::checkout::{Address, CheckoutError, ShippingData};
use storefront_core::order::Order;

/// Checkout form fields.
///
/// The billing address is the shipping address.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CheckoutForm {
    /// Recipient name
    pub recipient: String,
    /// Street
    pub street: String,
    /// House number
    pub number: String,
    /// Apartment, suite
    pub complement: String,
    /// Neighbourhood
    pub district: String,
    /// City
    pub city: String,
    /// State code
    pub state: String,
    /// Postal code
    pub postal_code: String,
    /// Contact phone
    pub phone: String,
    /// Delivery notes
    pub notes: String,
    /// Coupon code
    pub coupon_code: String,
}

fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl CheckoutForm {
    fn into_parts(self) -> (ShippingData, Option<String>) {
        let address = Address {
            recipient: self.recipient.trim().to_string(),
            street: self.street.trim().to_string(),
            number: self.number.trim().to_string(),
            complement: optional(self.complement),
            district: optional(self.district),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            phone: optional(self.phone),
        };
        let shipping = ShippingData {
            shipping_address: address,
            billing_address: None,
            notes: optional(self.notes),
        };
        (shipping, optional(self.coupon_code))
    }
}

/// Place an order from the cart.
///
/// Success redirects (303) to the new order; a domain failure redirects back
/// to `/cart` with the reason in the flash cookie. Storage failures answer 500.
pub async fn checkout(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Form(form): Form<CheckoutForm>,
) -> Result<Response, AppError> {
    let (shipping, coupon) = form.into_parts();

    match state.orders.checkout(user_id, shipping, coupon.as_deref()).await {
        Ok(order) => Ok(FlashRedirect::to(
            format!("/orders/{}", order.id),
            Flash::success(format!("Order {} placed successfully", order.order_number)),
        )
        .into_response()),
        Err(CheckoutError::Store(e)) => Err(e.into()),
        Err(err) => {
            tracing::info!(%user_id, error = %err, "Checkout refused");
            Ok(FlashRedirect::to("/cart", Flash::error(err.to_string())).into_response())
        }
    }
}

/// The user's orders.
pub async fn list_orders(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.orders_for_user(user_id).await?))
}

/// One of the user's orders. Someone else's order is 404.
pub async fn get_order(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.order_for_user(user_id, order_id).await?))
}

/// Request body for cancellations.
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    /// Free-text reason
    pub reason: Option<String>,
}

/// Cancel one of the user's orders; stock is restored.
pub async fn cancel_order(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    OptionalJson(request): OptionalJson<CancelRequest>,
) -> Result<Json<Order>, AppError> {
    let reason = request.and_then(|r| r.reason);
    Ok(Json(
        state.orders.cancel_for_user(user_id, order_id, reason).await?,
    ))
}
