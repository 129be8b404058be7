//! Catalog entities: products and categories.
//!
//! Products are read by every other component. Their stock is the only field
//! mutated outside admin editing: checkout decrements it, cancellation restores it.

use crate::ids::{CategoryId, ProductId};
use crate::money::Money;
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A sellable product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier
    pub id: ProductId,
    /// Owning category
    pub category_id: CategoryId,
    /// Display name
    pub name: String,
    /// Stock keeping unit, unique across the catalog
    pub sku: String,
    /// Long description
    pub description: Option<String>,
    /// List price
    pub price: Money,
    /// Promotional price, only honoured when lower than `price`
    pub promotional_price: Option<Money>,
    /// Units on hand
    pub stock_quantity: u32,
    /// Threshold at or below which the product counts as low stock
    pub min_stock: u32,
    /// Shipping weight of one unit in grams
    pub weight_grams: u32,
    /// Whether the product is offered in the storefront
    pub active: bool,
    /// Image paths, first one is the cover
    pub images: Vec<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The price a shopper pays for one unit.
    #[must_use]
    pub fn effective_price(&self) -> Money {
        match self.promotional_price {
            Some(promo) if promo < self.price => promo,
            _ => self.price,
        }
    }

    /// True when a valid promotional price is set.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.effective_price() < self.price
    }

    /// Active and with at least one unit on hand.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.active && self.stock_quantity > 0
    }

    /// Stock at or below the configured minimum.
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock
    }

    /// Check the invariants an admin edit must respect.
    ///
    /// # Errors
    ///
    /// Returns [`ProductValidationError`] for an empty name/SKU, a non-positive
    /// price, or a promotional price that is not below the list price.
    pub fn validate(&self) -> Result<(), ProductValidationError> {
        if self.name.trim().is_empty() {
            return Err(ProductValidationError::MissingName);
        }
        if self.sku.trim().is_empty() {
            return Err(ProductValidationError::MissingSku);
        }
        if !self.price.is_positive() {
            return Err(ProductValidationError::NonPositivePrice);
        }
        if let Some(promo) = self.promotional_price {
            if promo >= self.price || !promo.is_positive() {
                return Err(ProductValidationError::PromotionalPriceNotLower {
                    price: self.price,
                    promotional_price: promo,
                });
            }
        }
        Ok(())
    }
}

/// Invalid product data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductValidationError {
    /// Name is blank
    #[error("Product name is required")]
    MissingName,

    /// SKU is blank
    #[error("Product SKU is required")]
    MissingSku,

    /// Price is zero or negative
    #[error("Product price must be positive")]
    NonPositivePrice,

    /// Promotional price is not strictly below the list price
    #[error("Promotional price {promotional_price} must be lower than price {price}")]
    PromotionalPriceNotLower {
        /// List price
        price: Money,
        /// Rejected promotional price
        promotional_price: Money,
    },
}

/// Catalog operation failures.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// No such product
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    /// Order lines still reference the product
    #[error("Product {0} is referenced by orders and cannot be deleted")]
    ProductReferenced(ProductId),

    /// Storage failure
    #[error(transparent)]
    Store(StoreError),
}

impl CatalogError {
    /// Map a store error for an operation on `id`.
    #[must_use]
    pub fn from_store(id: ProductId, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::ProductNotFound(id),
            StoreError::Conflict(_) => Self::ProductReferenced(id),
            other => Self::Store(other),
        }
    }
}

/// A product category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category identifier
    pub id: CategoryId,
    /// Display name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Whether the category is shown in the storefront
    pub active: bool,
}

/// Category with the number of products it owns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    /// The category
    pub category: Category,
    /// Number of products in the category
    pub product_count: u64,
}

/// Storefront listing filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    /// Restrict to one category
    pub category_id: Option<CategoryId>,
    /// Case-insensitive match on name or SKU
    pub search: Option<String>,
    /// Only products with a valid promotional price
    pub on_sale: bool,
    /// Include inactive products (admin listings)
    pub include_inactive: bool,
    /// Maximum number of rows
    pub limit: Option<u32>,
}

impl ProductFilter {
    /// Listing visible to shoppers.
    #[must_use]
    pub fn storefront() -> Self {
        Self::default()
    }

    /// Whether `product` passes the filter.
    ///
    /// Stores that cannot push the filter down to a query use this directly.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if !self.include_inactive && !product.active {
            return false;
        }
        if self.category_id.is_some_and(|id| id != product.category_id) {
            return false;
        }
        if self.on_sale && !product.is_on_sale() {
            return false;
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            if !product.name.to_lowercase().contains(&needle)
                && !product.sku.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }

    /// Cache key fragment identifying this filter.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "c={}:s={}:sale={}:all={}:l={}",
            self.category_id.map(|id| id.to_string()).unwrap_or_default(),
            self.search.as_deref().unwrap_or_default().trim().to_lowercase(),
            self.on_sale,
            self.include_inactive,
            self.limit.unwrap_or_default(),
        )
    }
}
