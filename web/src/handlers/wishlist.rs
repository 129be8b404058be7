//! Wishlist endpoints.

use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::state::AppState;
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use storefront_core::ProductId;
use storefront_core::catalog::Product;

/// Products in the user's wishlist.
pub async fn list_wishlist(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.wishlist.list(user_id).await?))
}

/// Request body of `POST /wishlist/toggle`.
#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    /// Product to add or remove
    pub product_id: ProductId,
}

/// Response of `POST /wishlist/toggle`.
#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    /// Always `true`
    pub success: bool,
    /// Whether the product is in the wishlist now
    pub in_wishlist: bool,
    /// Confirmation text
    pub message: String,
}

/// Add the product if absent, remove it if present.
pub async fn toggle_wishlist(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Json(request): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let in_wishlist = state.wishlist.toggle(user_id, request.product_id).await?;
    let message = if in_wishlist {
        "Product added to wishlist"
    } else {
        "Product removed from wishlist"
    };

    Ok(Json(ToggleResponse {
        success: true,
        in_wishlist,
        message: message.to_string(),
    }))
}
