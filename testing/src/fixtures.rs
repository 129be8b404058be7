//! Ready-made domain values.

use crate::test_clock;
use storefront_core::catalog::{Category, Product};
use storefront_core::checkout::{Address, Coupon, ShippingData};
use storefront_core::environment::Clock;
use storefront_core::{CategoryId, Money, ProductId};

/// Active category.
#[must_use]
pub fn category(name: &str) -> Category {
    Category {
        id: CategoryId::new(),
        name: name.to_string(),
        description: None,
        active: true,
    }
}

/// Active product weighing 500 g with a minimum stock of 2.
///
/// The SKU is derived from the name so it is unique as long as names are.
#[must_use]
pub fn product(category_id: CategoryId, name: &str, price_cents: i64, stock: u32) -> Product {
    let now = test_clock().now();
    Product {
        id: ProductId::new(),
        category_id,
        name: name.to_string(),
        sku: format!("SKU-{}", name.to_uppercase().replace(' ', "-")),
        description: None,
        price: Money::from_cents(price_cents),
        promotional_price: None,
        stock_quantity: stock,
        min_stock: 2,
        weight_grams: 500,
        active: true,
        images: vec![],
        created_at: now,
        updated_at: now,
    }
}

/// Complete delivery address.
#[must_use]
pub fn address() -> Address {
    Address {
        recipient: "Maria Silva".to_string(),
        street: "Avenida Paulista".to_string(),
        number: "1000".to_string(),
        complement: Some("Apto 12".to_string()),
        district: Some("Bela Vista".to_string()),
        city: "São Paulo".to_string(),
        state: "SP".to_string(),
        postal_code: "01310-100".to_string(),
        phone: Some("+55 11 99999-0000".to_string()),
    }
}

/// Checkout input with billing defaulting to shipping.
#[must_use]
pub fn shipping_data() -> ShippingData {
    ShippingData {
        shipping_address: address(),
        billing_address: None,
        notes: None,
    }
}

/// The seeded 10 % coupon.
#[must_use]
pub fn desconto10() -> Coupon {
    Coupon {
        code: "DESCONTO10".to_string(),
        percent_bps: 1_000,
        active: true,
        valid_from: None,
        valid_until: None,
    }
}
