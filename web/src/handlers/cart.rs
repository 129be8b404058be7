//! Cart endpoints.
//!
//! Mutations answer `{success, message, ...}`. Domain failures and unreadable
//! request bodies are reported as `{success: false, message}` with 400 so the
//! storefront script can show the message inline; storage failures fall
//! through to [`AppError`].
//!
//! - `GET /cart` - priced cart summary
//! - `GET /cart/count` - `{cart_count}`
//! - `POST /cart/add` - `{product_id, quantity}`
//! - `POST /cart/update` - `{item_id, quantity}`
//! - `POST /cart/remove` - `{item_id}`
//! - `POST /cart/clear`

use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use storefront_core::cart::{CartError, CartSummary};
use storefront_core::{CartItemId, ProductId};

/// Cart mutation failure.
#[derive(Debug)]
pub enum CartFailure {
    /// The cart rules refused the change, or storage failed
    Cart(CartError),
    /// The request body could not be read
    Body(JsonRejection),
}

impl From<CartError> for CartFailure {
    fn from(err: CartError) -> Self {
        Self::Cart(err)
    }
}

impl From<JsonRejection> for CartFailure {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

fn refused(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(FailureBody {
            success: false,
            message,
        }),
    )
        .into_response()
}

#[derive(Serialize)]
struct FailureBody {
    success: bool,
    message: String,
}

impl IntoResponse for CartFailure {
    fn into_response(self) -> Response {
        match self {
            Self::Cart(CartError::Store(e)) => AppError::from(e).into_response(),
            Self::Cart(err) => {
                tracing::debug!(error = %err, "Cart change refused");
                refused(err.to_string())
            }
            Self::Body(rejection) => {
                tracing::debug!(error = %rejection, "Unreadable cart request");
                refused(rejection.body_text())
            }
        }
    }
}

const fn one() -> u32 {
    1
}

/// Request body of `POST /cart/add`.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    /// Product to add
    pub product_id: ProductId,
    /// Units to add, default 1
    #[serde(default = "one")]
    pub quantity: u32,
}

/// Response of `POST /cart/add`.
#[derive(Debug, Serialize)]
pub struct AddItemResponse {
    /// Always `true`
    pub success: bool,
    /// Confirmation text
    pub message: String,
    /// Units in the cart after the change
    pub cart_count: u32,
    /// Line that was created or increased
    pub item_id: CartItemId,
}

/// Add units of a product to the cart.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/cart/add \
///   -H "X-User-Id: 550e8400-e29b-41d4-a716-446655440000" \
///   -H "Content-Type: application/json" \
///   -d '{"product_id": "660e8400-e29b-41d4-a716-446655440001", "quantity": 2}'
/// ```
pub async fn add_item(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    body: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<Json<AddItemResponse>, CartFailure> {
    let Json(request) = body?;
    let item = state
        .cart
        .add_item(user_id, request.product_id, request.quantity)
        .await?;
    let cart_count = state.cart.count(user_id).await?;

    Ok(Json(AddItemResponse {
        success: true,
        message: "Product added to cart".to_string(),
        cart_count,
        item_id: item.id,
    }))
}

/// Request body of `POST /cart/update`.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    /// Line to change
    pub item_id: CartItemId,
    /// New absolute quantity
    pub quantity: u32,
}

/// Response of `POST /cart/update`.
#[derive(Debug, Serialize)]
pub struct UpdateItemResponse {
    /// Always `true`
    pub success: bool,
    /// Confirmation text
    pub message: String,
    /// Units in the cart after the change
    pub cart_count: u32,
    /// New total of the changed line
    pub item_total: String,
    /// New cart subtotal
    pub cart_total: String,
}

/// Replace the quantity of one line.
pub async fn update_item(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    body: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<UpdateItemResponse>, CartFailure> {
    let Json(request) = body?;
    state
        .cart
        .update_quantity(user_id, request.item_id, request.quantity)
        .await?;
    let summary = state.cart.summary(user_id).await?;
    let item_total = summary
        .lines
        .iter()
        .find(|line| line.item_id == request.item_id)
        .map(|line| line.line_total)
        .unwrap_or_default();

    Ok(Json(UpdateItemResponse {
        success: true,
        message: "Cart updated".to_string(),
        cart_count: state.cart.count(user_id).await?,
        item_total: item_total.to_string(),
        cart_total: summary.subtotal.to_string(),
    }))
}

/// Request body of `POST /cart/remove`.
#[derive(Debug, Deserialize)]
pub struct RemoveItemRequest {
    /// Line to delete
    pub item_id: CartItemId,
}

/// Response of `POST /cart/remove`.
#[derive(Debug, Serialize)]
pub struct RemoveItemResponse {
    /// Always `true`
    pub success: bool,
    /// Confirmation text
    pub message: String,
    /// Units in the cart after the change
    pub cart_count: u32,
}

/// Delete one line.
pub async fn remove_item(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    body: Result<Json<RemoveItemRequest>, JsonRejection>,
) -> Result<Json<RemoveItemResponse>, CartFailure> {
    let Json(request) = body?;
    state.cart.remove_item(user_id, request.item_id).await?;

    Ok(Json(RemoveItemResponse {
        success: true,
        message: "Item removed from cart".to_string(),
        cart_count: state.cart.count(user_id).await?,
    }))
}

/// Response of `POST /cart/clear`.
#[derive(Debug, Serialize)]
pub struct ClearCartResponse {
    /// Always `true`
    pub success: bool,
    /// Confirmation text
    pub message: String,
    /// Lines deleted
    pub removed: u64,
}

/// Empty the cart.
pub async fn clear_cart(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ClearCartResponse>, CartFailure> {
    let removed = state.cart.clear(user_id).await?;

    Ok(Json(ClearCartResponse {
        success: true,
        message: "Cart cleared".to_string(),
        removed,
    }))
}

/// Priced summary of the cart.
pub async fn show_cart(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<CartSummary>, AppError> {
    Ok(Json(state.cart.summary(user_id).await?))
}

/// Response of `GET /cart/count`.
#[derive(Debug, Serialize)]
pub struct CartCountResponse {
    /// Units in the cart
    pub cart_count: u32,
}

/// Number of units in the cart, served from cache when possible.
pub async fn cart_count(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<CartCountResponse>, AppError> {
    Ok(Json(CartCountResponse {
        cart_count: state.cart.count(user_id).await?,
    }))
}
