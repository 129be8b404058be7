use crate::PgStorefront;
use crate::rows::{self, ORDER_COLUMNS, db_err, to_db_quantity};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, Row};
use std::collections::BTreeMap;
use storefront_core::checkout::OrderDraft;
use storefront_core::order::{Order, OrderStatus, PaymentStatus, order_number};
use storefront_core::store::{OrderStore, StoreError, StoreFuture};
use storefront_core::{OrderId, OrderItemId, ProductId, UserId};

/// Lock the order row and return its current statuses.
async fn lock_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<(OrderStatus, PaymentStatus), StoreError> {
    let row = sqlx::query("SELECT status, payment_status FROM orders WHERE id = $1 FOR UPDATE")
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| StoreError::not_found("order", id))?;

    let status: String = row.try_get("status").map_err(db_err)?;
    let payment: String = row.try_get("payment_status").map_err(db_err)?;
    Ok((
        status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Database(format!("{e}")))?,
        payment
            .parse::<PaymentStatus>()
            .map_err(|e| StoreError::Database(format!("{e}")))?,
    ))
}

async fn reload(conn: &mut PgConnection, id: OrderId) -> Result<Order, StoreError> {
    rows::load_order(conn, id)
        .await
        .map_err(db_err)?
        .ok_or_else(|| StoreError::not_found("order", id))
}

impl OrderStore for PgStorefront {
    fn place_order(&self, draft: OrderDraft) -> StoreFuture<'_, Order> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            let user = *draft.user_id.as_uuid();

            let mut needed: BTreeMap<ProductId, u32> = BTreeMap::new();
            for item in &draft.items {
                *needed.entry(item.product_id).or_default() += item.quantity;
            }

            // Concurrent cart writes wait on these locks until the order commits.
            let locked: Vec<(uuid::Uuid, i32)> = sqlx::query_as(
                "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY product_id FOR UPDATE",
            )
            .bind(user)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_err)?;
            if locked.is_empty() {
                return Err(StoreError::EmptyCart);
            }
            let in_cart: BTreeMap<ProductId, u32> = locked
                .into_iter()
                .map(|(product_id, quantity)| {
                    (
                        ProductId::from_uuid(product_id),
                        u32::try_from(quantity).unwrap_or(0),
                    )
                })
                .collect();
            if in_cart != needed {
                return Err(StoreError::CartChanged);
            }

            // Product order keeps row locks consistent across concurrent checkouts.
            for (product_id, requested) in &needed {
                let updated = sqlx::query(
                    r"
                    UPDATE products
                    SET stock_quantity = stock_quantity - $2, updated_at = $3
                    WHERE id = $1 AND active AND stock_quantity >= $2
                    ",
                )
                .bind(*product_id.as_uuid())
                .bind(to_db_quantity(*requested))
                .bind(draft.placed_at)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

                if updated.rows_affected() == 0 {
                    let available: Option<i32> = sqlx::query_scalar(
                        "SELECT CASE WHEN active THEN stock_quantity ELSE 0 END FROM products WHERE id = $1",
                    )
                    .bind(*product_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_err)?;
                    return Err(StoreError::InsufficientStock {
                        product_id: *product_id,
                        requested: *requested,
                        available: available.and_then(|a| u32::try_from(a).ok()).unwrap_or(0),
                    });
                }
            }

            let day = draft.placed_at.date_naive();
            let sequence: i32 = sqlx::query_scalar(
                r"
                INSERT INTO order_sequences (day, last_value) VALUES ($1, 1)
                ON CONFLICT (day) DO UPDATE SET last_value = order_sequences.last_value + 1
                RETURNING last_value
                ",
            )
            .bind(day)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

            let id = OrderId::new();
            sqlx::query(
                r"
                INSERT INTO orders (
                    id, order_number, user_id, status, payment_status,
                    subtotal_cents, shipping_cents, discount_cents, total_cents, coupon_code,
                    shipping_address, billing_address, notes, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
                ",
            )
            .bind(*id.as_uuid())
            .bind(order_number(day, u32::try_from(sequence).unwrap_or(0)))
            .bind(user)
            .bind(OrderStatus::Pending.as_str())
            .bind(PaymentStatus::Pending.as_str())
            .bind(draft.subtotal.cents())
            .bind(draft.shipping_cost.cents())
            .bind(draft.discount.cents())
            .bind(draft.total.cents())
            .bind(draft.coupon_code.as_deref())
            .bind(Json(&draft.shipping_address))
            .bind(Json(&draft.billing_address))
            .bind(draft.notes.as_deref())
            .bind(draft.placed_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            for item in &draft.items {
                sqlx::query(
                    r"
                    INSERT INTO order_items (
                        id, order_id, product_id, product_name, sku,
                        unit_price_cents, quantity, line_total_cents
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ",
                )
                .bind(*OrderItemId::new().as_uuid())
                .bind(*id.as_uuid())
                .bind(*item.product_id.as_uuid())
                .bind(&item.product_name)
                .bind(&item.sku)
                .bind(item.unit_price.cents())
                .bind(to_db_quantity(item.quantity))
                .bind(item.line_total.cents())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }

            let ordered: Vec<uuid::Uuid> = needed.keys().map(|id| *id.as_uuid()).collect();
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = ANY($2)")
                .bind(user)
                .bind(&ordered)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            let order = reload(&mut tx, id).await?;
            tx.commit().await.map_err(db_err)?;
            tracing::debug!(order_id = %id, order_number = %order.order_number, "Order persisted");
            Ok(order)
        })
    }

    fn order(&self, id: OrderId) -> StoreFuture<'_, Option<Order>> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await.map_err(db_err)?;
            rows::load_order(&mut conn, id).await.map_err(db_err)
        })
    }

    fn orders_for_user(&self, user_id: UserId) -> StoreFuture<'_, Vec<Order>> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await.map_err(db_err)?;
            let headers = sqlx::query(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, order_number DESC"
            ))
            .bind(*user_id.as_uuid())
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err)?;
            rows::load_orders(&mut conn, &headers).await.map_err(db_err)
        })
    }

    fn cancel_order(
        &self,
        id: OrderId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            let (status, _) = lock_order(&mut tx, id).await?;
            if !status.can_cancel() {
                return Err(StoreError::InvalidTransition {
                    from: status,
                    to: OrderStatus::Cancelled,
                });
            }

            sqlx::query(
                r"
                UPDATE orders
                SET status = $2, cancellation_reason = $3, cancelled_at = $4, updated_at = $4
                WHERE id = $1
                ",
            )
            .bind(*id.as_uuid())
            .bind(OrderStatus::Cancelled.as_str())
            .bind(reason.as_deref())
            .bind(at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            sqlx::query(
                r"
                UPDATE products p
                SET stock_quantity = p.stock_quantity + oi.quantity, updated_at = $2
                FROM (
                    SELECT product_id, SUM(quantity)::INTEGER AS quantity
                    FROM order_items WHERE order_id = $1 GROUP BY product_id
                ) oi
                WHERE p.id = oi.product_id
                ",
            )
            .bind(*id.as_uuid())
            .bind(at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            let order = reload(&mut tx, id).await?;
            tx.commit().await.map_err(db_err)?;
            Ok(order)
        })
    }

    fn update_order_status(
        &self,
        id: OrderId,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            let (from, _) = lock_order(&mut tx, id).await?;
            if to == OrderStatus::Cancelled || !from.can_transition_to(to) {
                return Err(StoreError::InvalidTransition { from, to });
            }

            sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(*id.as_uuid())
                .bind(to.as_str())
                .bind(at)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            let order = reload(&mut tx, id).await?;
            tx.commit().await.map_err(db_err)?;
            Ok(order)
        })
    }

    fn update_payment_status(
        &self,
        id: OrderId,
        to: PaymentStatus,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            let (_, from) = lock_order(&mut tx, id).await?;
            if !from.can_transition_to(to) {
                return Err(StoreError::InvalidPaymentTransition { from, to });
            }

            sqlx::query("UPDATE orders SET payment_status = $2, updated_at = $3 WHERE id = $1")
                .bind(*id.as_uuid())
                .bind(to.as_str())
                .bind(at)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            let order = reload(&mut tx, id).await?;
            tx.commit().await.map_err(db_err)?;
            Ok(order)
        })
    }
}
