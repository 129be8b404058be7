//! Catalog browsing endpoints. Public; no user header required.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use storefront_core::catalog::{CategorySummary, Product, ProductFilter};
use storefront_core::{CategoryId, ProductId};

/// Largest page a listing returns.
const MAX_LIMIT: u32 = 100;

/// Query string of `GET /products`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductQuery {
    /// Category to restrict to
    pub category: Option<CategoryId>,
    /// Name or SKU fragment
    pub search: Option<String>,
    /// Only promotional products
    pub on_sale: bool,
    /// Maximum rows
    pub limit: Option<u32>,
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        Self {
            category_id: query.category,
            search: query
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            on_sale: query.on_sale,
            limit: Some(query.limit.unwrap_or(MAX_LIMIT).min(MAX_LIMIT)),
            ..Self::storefront()
        }
    }
}

/// Active products matching the query.
///
/// ```text
/// GET /products?category=<uuid>&search=chess&on_sale=true
/// ```
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let filter = ProductFilter::from(query);
    Ok(Json(state.catalog.products(&filter).await?))
}

/// One active product.
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.catalog.product(product_id).await?))
}

/// Active categories with product counts.
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategorySummary>>, AppError> {
    Ok(Json(state.catalog.categories().await?))
}
