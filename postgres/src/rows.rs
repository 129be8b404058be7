//! Row decoding shared by the store implementations.

use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, Row};
use std::collections::HashMap;
use storefront_core::cart::CartItem;
use storefront_core::catalog::{Category, CategorySummary, Product};
use storefront_core::checkout::Address;
use storefront_core::order::{Order, OrderItem, OrderStatus, PaymentStatus};
use storefront_core::store::StoreError;
use storefront_core::{CartItemId, CategoryId, Money, OrderId, OrderItemId, ProductId, UserId};
use uuid::Uuid;

/// Product columns, prefixed with the `p` alias.
pub const PRODUCT_COLUMNS: &str = "p.id, p.category_id, p.name, p.sku, p.description, \
    p.price_cents, p.promotional_price_cents, p.stock_quantity, p.min_stock, p.weight_grams, \
    p.active, p.images, p.created_at, p.updated_at";

/// Order header columns.
pub const ORDER_COLUMNS: &str = "id, order_number, user_id, status, payment_status, \
    subtotal_cents, shipping_cents, discount_cents, total_cents, coupon_code, \
    shipping_address, billing_address, notes, cancellation_reason, cancelled_at, \
    created_at, updated_at";

/// Map a driver error.
#[allow(clippy::needless_pass_by_value)] // Used as a `map_err` callback
pub fn db_err(e: sqlx::Error) -> StoreError {
    tracing::error!(error = %e, "Database query failed");
    StoreError::Database(e.to_string())
}

/// Quantities are `u32` in the domain and `INTEGER` in the schema.
pub fn to_db_quantity(quantity: u32) -> i32 {
    i32::try_from(quantity).unwrap_or(i32::MAX)
}

fn from_db_quantity(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// Counts are `BIGINT` in SQL.
pub fn from_db_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn decode_err(e: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

pub fn product(row: &PgRow) -> Result<Product, sqlx::Error> {
    let images: Json<Vec<String>> = row.try_get("images")?;
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        category_id: CategoryId::from_uuid(row.try_get("category_id")?),
        name: row.try_get("name")?,
        sku: row.try_get("sku")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        promotional_price: row
            .try_get::<Option<i64>, _>("promotional_price_cents")?
            .map(Money::from_cents),
        stock_quantity: from_db_quantity(row.try_get("stock_quantity")?),
        min_stock: from_db_quantity(row.try_get("min_stock")?),
        weight_grams: from_db_quantity(row.try_get("weight_grams")?),
        active: row.try_get("active")?,
        images: images.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn category_summary(row: &PgRow) -> Result<CategorySummary, sqlx::Error> {
    Ok(CategorySummary {
        category: Category {
            id: CategoryId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            active: row.try_get("active")?,
        },
        product_count: from_db_count(row.try_get("product_count")?),
    })
}

/// Cart line columns aliased as `item_*` so they can sit next to product columns.
pub fn cart_item_prefixed(row: &PgRow) -> Result<CartItem, sqlx::Error> {
    Ok(CartItem {
        id: CartItemId::from_uuid(row.try_get("item_id")?),
        user_id: UserId::from_uuid(row.try_get("item_user_id")?),
        product_id: ProductId::from_uuid(row.try_get("item_product_id")?),
        quantity: from_db_quantity(row.try_get("item_quantity")?),
        created_at: row.try_get("item_created_at")?,
        updated_at: row.try_get("item_updated_at")?,
    })
}

pub fn cart_item(row: &PgRow) -> Result<CartItem, sqlx::Error> {
    Ok(CartItem {
        id: CartItemId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        quantity: from_db_quantity(row.try_get("quantity")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn order_item(row: &PgRow) -> Result<OrderItem, sqlx::Error> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        product_name: row.try_get("product_name")?,
        sku: row.try_get("sku")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        quantity: from_db_quantity(row.try_get("quantity")?),
        line_total: Money::from_cents(row.try_get("line_total_cents")?),
    })
}

fn order_header(row: &PgRow) -> Result<Order, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;
    let shipping_address: Json<Address> = row.try_get("shipping_address")?;
    let billing_address: Json<Address> = row.try_get("billing_address")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        order_number: row.try_get("order_number")?,
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        status: status.parse::<OrderStatus>().map_err(decode_err)?,
        payment_status: payment_status.parse::<PaymentStatus>().map_err(decode_err)?,
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        shipping_cost: Money::from_cents(row.try_get("shipping_cents")?),
        discount: Money::from_cents(row.try_get("discount_cents")?),
        total: Money::from_cents(row.try_get("total_cents")?),
        coupon_code: row.try_get("coupon_code")?,
        shipping_address: shipping_address.0,
        billing_address: billing_address.0,
        notes: row.try_get("notes")?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        cancelled_at: row.try_get("cancelled_at")?,
        items: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Load one order with its lines.
pub async fn load_order(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, sqlx::Error> {
    let Some(row) = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };
    let mut order = order_header(&row)?;
    order.items = sqlx::query("SELECT * FROM order_items WHERE order_id = $1 ORDER BY product_name, id")
        .bind(*id.as_uuid())
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(order_item)
        .collect::<Result<_, _>>()?;
    Ok(Some(order))
}

/// Load order headers from `rows` and attach their lines with one extra query.
pub async fn load_orders(conn: &mut PgConnection, rows: &[PgRow]) -> Result<Vec<Order>, sqlx::Error> {
    let mut orders = rows.iter().map(order_header).collect::<Result<Vec<_>, _>>()?;
    if orders.is_empty() {
        return Ok(orders);
    }

    let ids: Vec<Uuid> = orders.iter().map(|o| *o.id.as_uuid()).collect();
    let mut lines: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for row in sqlx::query(
        "SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY product_name, id",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?
    {
        let item = order_item(&row)?;
        lines.entry(item.order_id).or_default().push(item);
    }
    for order in &mut orders {
        order.items = lines.remove(&order.id).unwrap_or_default();
    }
    Ok(orders)
}
