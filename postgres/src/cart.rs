use crate::PgStorefront;
use crate::rows::{self, PRODUCT_COLUMNS, db_err, to_db_quantity};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use storefront_core::cart::{CartItem, CartLine, MAX_QUANTITY};
use storefront_core::store::{CartStore, StoreFuture};
use storefront_core::{CartItemId, ProductId, UserId};

const CART_ITEM_COLUMNS: &str = "id, user_id, product_id, quantity, created_at, updated_at";

fn line_query(condition: &str) -> String {
    format!(
        "SELECT c.id AS item_id, c.user_id AS item_user_id, c.product_id AS item_product_id, \
         c.quantity AS item_quantity, c.created_at AS item_created_at, \
         c.updated_at AS item_updated_at, {PRODUCT_COLUMNS} \
         FROM cart_items c JOIN products p ON p.id = c.product_id \
         WHERE {condition} ORDER BY c.created_at, c.id"
    )
}

fn line(row: &PgRow) -> Result<CartLine, sqlx::Error> {
    Ok(CartLine {
        item: rows::cart_item_prefixed(row)?,
        product: rows::product(row)?,
    })
}

impl CartStore for PgStorefront {
    fn cart_lines(&self, user_id: UserId) -> StoreFuture<'_, Vec<CartLine>> {
        Box::pin(async move {
            sqlx::query(&line_query("c.user_id = $1"))
                .bind(*user_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?
                .iter()
                .map(line)
                .collect::<Result<_, _>>()
                .map_err(db_err)
        })
    }

    fn cart_line(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> StoreFuture<'_, Option<CartLine>> {
        Box::pin(async move {
            sqlx::query(&line_query("c.user_id = $1 AND c.id = $2"))
                .bind(*user_id.as_uuid())
                .bind(*item_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?
                .map(|row| line(&row))
                .transpose()
                .map_err(db_err)
        })
    }

    fn cart_quantity(&self, user_id: UserId, product_id: ProductId) -> StoreFuture<'_, u32> {
        Box::pin(async move {
            let quantity: Option<i32> = sqlx::query_scalar(
                "SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2",
            )
            .bind(*user_id.as_uuid())
            .bind(*product_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
            Ok(quantity.and_then(|q| u32::try_from(q).ok()).unwrap_or(0))
        })
    }

    fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Option<CartItem>> {
        Box::pin(async move {
            // Insert only for an active product with enough stock; on conflict
            // accumulate only while the line stays within stock and the cap.
            // The conflicting row is locked, so concurrent adds serialise here.
            sqlx::query(&format!(
                r"
                INSERT INTO cart_items (id, user_id, product_id, quantity, created_at, updated_at)
                SELECT $1, $2, p.id, $4, $5, $5
                FROM products p
                WHERE p.id = $3 AND p.active AND p.stock_quantity >= $4 AND $4 <= $6
                ON CONFLICT (user_id, product_id) DO UPDATE
                SET quantity = cart_items.quantity + EXCLUDED.quantity,
                    updated_at = EXCLUDED.updated_at
                WHERE cart_items.quantity + EXCLUDED.quantity <= LEAST(
                    $6,
                    COALESCE(
                        (SELECT stock_quantity FROM products
                         WHERE id = EXCLUDED.product_id AND active),
                        0
                    )
                )
                RETURNING {CART_ITEM_COLUMNS}
                "
            ))
            .bind(*CartItemId::new().as_uuid())
            .bind(*user_id.as_uuid())
            .bind(*product_id.as_uuid())
            .bind(to_db_quantity(quantity))
            .bind(at)
            .bind(to_db_quantity(MAX_QUANTITY))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(|row| rows::cart_item(&row))
            .transpose()
            .map_err(db_err)
        })
    }

    fn set_cart_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Option<CartItem>> {
        Box::pin(async move {
            sqlx::query(
                r"
                UPDATE cart_items c
                SET quantity = $3, updated_at = $4
                FROM products p
                WHERE c.id = $1 AND c.user_id = $2 AND p.id = c.product_id
                  AND p.active AND $3 >= 1 AND $3 <= LEAST($5, p.stock_quantity)
                RETURNING c.id, c.user_id, c.product_id, c.quantity, c.created_at, c.updated_at
                ",
            )
            .bind(*item_id.as_uuid())
            .bind(*user_id.as_uuid())
            .bind(to_db_quantity(quantity))
            .bind(at)
            .bind(to_db_quantity(MAX_QUANTITY))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(|row| rows::cart_item(&row))
            .transpose()
            .map_err(db_err)
        })
    }

    fn remove_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> StoreFuture<'_, Option<CartItem>> {
        Box::pin(async move {
            sqlx::query(&format!(
                "DELETE FROM cart_items WHERE id = $1 AND user_id = $2 RETURNING {CART_ITEM_COLUMNS}"
            ))
            .bind(*item_id.as_uuid())
            .bind(*user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(|row| rows::cart_item(&row))
            .transpose()
            .map_err(db_err)
        })
    }

    fn clear_cart(&self, user_id: UserId) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
                .bind(*user_id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            Ok(result.rows_affected())
        })
    }

    fn cart_count(&self, user_id: UserId) -> StoreFuture<'_, u32> {
        Box::pin(async move {
            let count: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM cart_items WHERE user_id = $1",
            )
            .bind(*user_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            Ok(u32::try_from(count).unwrap_or(u32::MAX))
        })
    }
}
