//! Turning a cart into an order draft.
//!
//! [`plan`] is pure: it prices the cart snapshot, quotes shipping, applies the
//! coupon and freezes the line snapshots. The store then persists the draft and
//! re-checks stock atomically.

use crate::cart::{CartLine, Unavailability};
use crate::ids::{ProductId, UserId};
use crate::money::Money;
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Postal address copied onto an order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Person receiving the parcel
    pub recipient: String,
    /// Street name
    pub street: String,
    /// House number
    pub number: String,
    /// Apartment, block, ...
    #[serde(default)]
    pub complement: Option<String>,
    /// District / neighbourhood
    #[serde(default)]
    pub district: Option<String>,
    /// City
    pub city: String,
    /// State or province
    pub state: String,
    /// Postal code
    pub postal_code: String,
    /// Contact phone
    #[serde(default)]
    pub phone: Option<String>,
}

impl Address {
    /// Check that every required field is filled in.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::InvalidShippingData`] naming the first blank field.
    pub fn validate(&self, label: &str) -> Result<(), CheckoutError> {
        let required = [
            ("recipient", &self.recipient),
            ("street", &self.street),
            ("number", &self.number),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(CheckoutError::InvalidShippingData(format!(
                    "{label} {field} is required"
                )));
            }
        }
        Ok(())
    }
}

/// Customer input for checkout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingData {
    /// Where to deliver
    pub shipping_address: Address,
    /// Billing address, the shipping address when absent
    #[serde(default)]
    pub billing_address: Option<Address>,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
}

/// Shipping price table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRates {
    /// Flat fee per order
    pub base_fee: Money,
    /// Fee per started kilogram
    pub per_kg_fee: Money,
}

impl Default for ShippingRates {
    fn default() -> Self {
        Self {
            base_fee: Money::from_cents(1_500),
            per_kg_fee: Money::from_cents(250),
        }
    }
}

impl ShippingRates {
    /// Base fee plus the per-kg fee for every started kilogram.
    #[must_use]
    pub fn quote(&self, weight_grams: u64) -> Money {
        let kilos = u32::try_from(weight_grams.div_ceil(1_000)).unwrap_or(u32::MAX);
        self.base_fee + self.per_kg_fee.times(kilos)
    }
}

/// Percentage discount code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// Code, stored upper case
    pub code: String,
    /// Discount in basis points (1000 = 10 %)
    pub percent_bps: u32,
    /// Switched on by the shop
    pub active: bool,
    /// Not usable before this instant
    pub valid_from: Option<DateTime<Utc>>,
    /// Not usable after this instant
    pub valid_until: Option<DateTime<Utc>>,
}

impl Coupon {
    /// Canonical form used for storage and lookup.
    #[must_use]
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Active and inside its validity window.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.valid_from.is_none_or(|from| now >= from)
            && self.valid_until.is_none_or(|until| now <= until)
    }

    /// Discount this coupon grants on `subtotal`, rounded half up.
    #[must_use]
    pub fn discount_on(&self, subtotal: Money) -> Money {
        subtotal.basis_points(self.percent_bps.min(10_000))
    }
}

/// Frozen line of an order draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftItem {
    /// Product the line comes from
    pub product_id: ProductId,
    /// Product name now
    pub product_name: String,
    /// SKU now
    pub sku: String,
    /// Effective unit price now
    pub unit_price: Money,
    /// Units
    pub quantity: u32,
    /// `unit_price × quantity`
    pub line_total: Money,
}

/// A fully priced order waiting to be persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    /// Customer
    pub user_id: UserId,
    /// Lines, in cart order
    pub items: Vec<DraftItem>,
    /// Sum of line totals
    pub subtotal: Money,
    /// Shipping quote
    pub shipping_cost: Money,
    /// Coupon discount
    pub discount: Money,
    /// `subtotal + shipping_cost - discount`, never negative
    pub total: Money,
    /// Applied coupon code
    pub coupon_code: Option<String>,
    /// Shipping address snapshot
    pub shipping_address: Address,
    /// Billing address snapshot
    pub billing_address: Address,
    /// Customer notes
    pub notes: Option<String>,
    /// Placement time, also the day of the order number
    pub placed_at: DateTime<Utc>,
}

/// Checkout failures.
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Nothing to order
    #[error("Cart is empty")]
    EmptyCart,

    /// The cart was modified after the order was priced
    #[error("Your cart changed during checkout, please review it")]
    CartChanged,

    /// A line cannot be fulfilled from current stock
    #[error("Product {product_id} is not available: {reason}")]
    ProductNotAvailable {
        /// Offending product
        product_id: ProductId,
        /// Why
        reason: Unavailability,
    },

    /// Unknown, inactive or expired coupon code
    #[error("Invalid coupon code: {0}")]
    InvalidCoupon(String),

    /// Missing address fields
    #[error("Invalid shipping data: {0}")]
    InvalidShippingData(String),

    /// Storage failure
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmptyCart => Self::EmptyCart,
            StoreError::CartChanged => Self::CartChanged,
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => Self::ProductNotAvailable {
                product_id,
                reason: Unavailability::InsufficientStock {
                    available,
                    requested,
                },
            },
            other => Self::Store(other),
        }
    }
}

/// Price a cart snapshot into an [`OrderDraft`].
///
/// `coupon` is the coupon found for the code the customer typed, if any; the
/// caller reports unknown codes before getting here.
///
/// # Errors
///
/// - `EmptyCart` when there are no lines
/// - `InvalidShippingData` for blank address fields
/// - `ProductNotAvailable` for an inactive product or a line above current stock
/// - `InvalidCoupon` for an inactive or out-of-window coupon
pub fn plan(
    user_id: UserId,
    lines: &[CartLine],
    data: ShippingData,
    coupon: Option<&Coupon>,
    rates: &ShippingRates,
    now: DateTime<Utc>,
) -> Result<OrderDraft, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    data.shipping_address.validate("shipping")?;
    if let Some(billing) = &data.billing_address {
        billing.validate("billing")?;
    }

    for line in lines {
        let product = &line.product;
        if !product.active {
            return Err(CheckoutError::ProductNotAvailable {
                product_id: product.id,
                reason: Unavailability::Inactive,
            });
        }
        if line.item.quantity > product.stock_quantity {
            return Err(CheckoutError::ProductNotAvailable {
                product_id: product.id,
                reason: Unavailability::InsufficientStock {
                    available: product.stock_quantity,
                    requested: line.item.quantity,
                },
            });
        }
    }

    if let Some(coupon) = coupon {
        if !coupon.is_valid_at(now) {
            return Err(CheckoutError::InvalidCoupon(coupon.code.clone()));
        }
    }

    let items: Vec<DraftItem> = lines
        .iter()
        .map(|line| DraftItem {
            product_id: line.product.id,
            product_name: line.product.name.clone(),
            sku: line.product.sku.clone(),
            unit_price: line.product.effective_price(),
            quantity: line.item.quantity,
            line_total: line.line_total(),
        })
        .collect();

    let subtotal: Money = items.iter().map(|i| i.line_total).sum();
    let weight: u64 = lines.iter().map(CartLine::weight_grams).sum();
    let shipping_cost = rates.quote(weight);
    let discount = coupon.map_or(Money::ZERO, |c| c.discount_on(subtotal));
    let total = (subtotal + shipping_cost).saturating_sub(discount);

    let billing_address = data
        .billing_address
        .unwrap_or_else(|| data.shipping_address.clone());

    Ok(OrderDraft {
        user_id,
        items,
        subtotal,
        shipping_cost,
        discount,
        total,
        coupon_code: coupon.map(|c| c.code.clone()),
        shipping_address: data.shipping_address,
        billing_address,
        notes: data.notes.filter(|n| !n.trim().is_empty()),
        placed_at: now,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn address() -> Address {
        Address {
            recipient: "Ana Souza".to_string(),
            street: "Rua das Flores".to_string(),
            number: "100".to_string(),
            complement: None,
            district: Some("Centro".to_string()),
            city: "Curitiba".to_string(),
            state: "PR".to_string(),
            postal_code: "80000-000".to_string(),
            phone: None,
        }
    }

    pub(crate) fn shipping_data() -> ShippingData {
        ShippingData {
            shipping_address: address(),
            billing_address: None,
            notes: None,
        }
    }
}
