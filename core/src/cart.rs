//! Shopping cart lines and the rules guarding them.
//!
//! # Rules
//!
//! Adding to a cart checks, in this order:
//!
//! 1. the product is active and has stock
//! 2. the requested quantity lies in `1..=99`
//! 3. existing + requested does not exceed stock
//! 4. existing + requested does not exceed 99
//!
//! The checks here run against a snapshot of the product. Stores repeat the
//! stock guard inside the write itself so two concurrent adds cannot push a
//! line past the stock on hand.

use crate::catalog::Product;
use crate::ids::{CartItemId, ProductId, UserId};
use crate::money::Money;
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Smallest quantity a cart line can hold.
pub const MIN_QUANTITY: u32 = 1;

/// Largest quantity a cart line can hold.
pub const MAX_QUANTITY: u32 = 99;

/// One product in a user's cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Line identifier
    pub id: CartItemId,
    /// Owner of the cart
    pub user_id: UserId,
    /// Product in the line
    pub product_id: ProductId,
    /// Units, always within `MIN_QUANTITY..=MAX_QUANTITY`
    pub quantity: u32,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// A cart line joined with the current product row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The cart line
    pub item: CartItem,
    /// The product as it is now
    pub product: Product,
}

impl CartLine {
    /// Effective unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.product.effective_price().times(self.item.quantity)
    }

    /// Weight of the whole line in grams.
    #[must_use]
    pub fn weight_grams(&self) -> u64 {
        u64::from(self.product.weight_grams) * u64::from(self.item.quantity)
    }
}

/// Priced view of a cart.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    /// Lines in insertion order
    pub lines: Vec<CartLineView>,
    /// Sum of quantities
    pub item_count: u32,
    /// Sum of line totals
    pub subtotal: Money,
    /// Total shipping weight in grams
    pub weight_grams: u64,
}

/// One priced cart line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineView {
    /// Line identifier
    pub item_id: CartItemId,
    /// Product identifier
    pub product_id: ProductId,
    /// Product name
    pub name: String,
    /// Product SKU
    pub sku: String,
    /// Units
    pub quantity: u32,
    /// Effective unit price
    pub unit_price: Money,
    /// `unit_price × quantity`
    pub line_total: Money,
    /// Whether the line can still be bought as is
    pub available: bool,
}

impl CartSummary {
    /// Price a set of cart lines.
    #[must_use]
    pub fn from_lines(lines: &[CartLine]) -> Self {
        let views: Vec<CartLineView> = lines
            .iter()
            .map(|line| CartLineView {
                item_id: line.item.id,
                product_id: line.product.id,
                name: line.product.name.clone(),
                sku: line.product.sku.clone(),
                quantity: line.item.quantity,
                unit_price: line.product.effective_price(),
                line_total: line.line_total(),
                available: line.product.active
                    && line.item.quantity <= line.product.stock_quantity,
            })
            .collect();

        Self {
            item_count: views.iter().map(|v| v.quantity).sum(),
            subtotal: views.iter().map(|v| v.line_total).sum(),
            weight_grams: lines.iter().map(CartLine::weight_grams).sum(),
            lines: views,
        }
    }

    /// True when there is nothing to check out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Why a product cannot go into a cart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unavailability {
    /// The product is switched off
    Inactive,
    /// No units on hand
    OutOfStock,
    /// Fewer units on hand than the line would need
    InsufficientStock {
        /// Units on hand
        available: u32,
        /// Units the line would hold
        requested: u32,
    },
}

impl fmt::Display for Unavailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "product is not active"),
            Self::OutOfStock => write!(f, "product is out of stock"),
            Self::InsufficientStock { available, requested } => write!(
                f,
                "only {available} unit(s) in stock, {requested} requested"
            ),
        }
    }
}

/// Cart operation failures.
#[derive(Error, Debug)]
pub enum CartError {
    /// Quantity outside `1..=99`
    #[error("Invalid quantity {quantity}: must be between {MIN_QUANTITY} and {MAX_QUANTITY}")]
    InvalidQuantity {
        /// Rejected quantity
        quantity: u32,
    },

    /// Product inactive or without enough stock
    #[error("Product {product_id} is not available: {reason}")]
    ProductNotAvailable {
        /// Product that was requested
        product_id: ProductId,
        /// What made it unavailable
        reason: Unavailability,
    },

    /// No such product
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    /// No such line in this user's cart
    #[error("Cart item {0} not found")]
    ItemNotFound(CartItemId),

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

const fn check_available(product: &Product) -> Result<(), CartError> {
    if !product.active {
        return Err(CartError::ProductNotAvailable {
            product_id: product.id,
            reason: Unavailability::Inactive,
        });
    }
    if product.stock_quantity == 0 {
        return Err(CartError::ProductNotAvailable {
            product_id: product.id,
            reason: Unavailability::OutOfStock,
        });
    }
    Ok(())
}

const fn check_range(quantity: u32) -> Result<(), CartError> {
    if quantity < MIN_QUANTITY || quantity > MAX_QUANTITY {
        return Err(CartError::InvalidQuantity { quantity });
    }
    Ok(())
}

const fn check_total(product: &Product, total: u32) -> Result<(), CartError> {
    if total > product.stock_quantity {
        return Err(CartError::ProductNotAvailable {
            product_id: product.id,
            reason: Unavailability::InsufficientStock {
                available: product.stock_quantity,
                requested: total,
            },
        });
    }
    if total > MAX_QUANTITY {
        return Err(CartError::InvalidQuantity { quantity: total });
    }
    Ok(())
}

/// Validate adding `requested` units on top of `existing` ones.
///
/// Returns the resulting line quantity.
///
/// # Errors
///
/// [`CartError::ProductNotAvailable`] or [`CartError::InvalidQuantity`], in the
/// order documented at module level.
pub fn check_add(product: &Product, existing: u32, requested: u32) -> Result<u32, CartError> {
    check_available(product)?;
    check_range(requested)?;
    let total = existing.saturating_add(requested);
    check_total(product, total)?;
    Ok(total)
}

/// Validate replacing a line's quantity with `quantity`.
///
/// # Errors
///
/// Same as [`check_add`].
pub fn check_set(product: &Product, quantity: u32) -> Result<u32, CartError> {
    check_available(product)?;
    check_range(quantity)?;
    check_total(product, quantity)?;
    Ok(quantity)
}
