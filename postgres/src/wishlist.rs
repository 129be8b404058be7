use crate::PgStorefront;
use crate::rows::{self, PRODUCT_COLUMNS, db_err};
use chrono::{DateTime, Utc};
use sqlx::Row;
use storefront_core::catalog::Product;
use storefront_core::checkout::Coupon;
use storefront_core::store::{CouponStore, StoreError, StoreFuture, WishlistStore};
use storefront_core::{ProductId, UserId};

impl WishlistStore for PgStorefront {
    fn wishlist(&self, user_id: UserId) -> StoreFuture<'_, Vec<Product>> {
        Box::pin(async move {
            sqlx::query(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM wishlist_items w \
                 JOIN products p ON p.id = w.product_id \
                 WHERE w.user_id = $1 ORDER BY w.created_at DESC"
            ))
            .bind(*user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(rows::product)
            .collect::<Result<_, _>>()
            .map_err(db_err)
        })
    }

    fn wishlist_contains(&self, user_id: UserId, product_id: ProductId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM wishlist_items WHERE user_id = $1 AND product_id = $2)",
            )
            .bind(*user_id.as_uuid())
            .bind(*product_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        })
    }

    fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                INSERT INTO wishlist_items (user_id, product_id, created_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, product_id) DO NOTHING
                ",
            )
            .bind(*user_id.as_uuid())
            .bind(*product_id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    StoreError::not_found("product", product_id)
                }
                _ => db_err(e),
            })?;
            Ok(result.rows_affected() == 1)
        })
    }

    fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result =
                sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
                    .bind(*user_id.as_uuid())
                    .bind(*product_id.as_uuid())
                    .execute(&self.pool)
                    .await
                    .map_err(db_err)?;
            Ok(result.rows_affected() == 1)
        })
    }
}

impl CouponStore for PgStorefront {
    fn coupon<'a>(&'a self, code: &'a str) -> StoreFuture<'a, Option<Coupon>> {
        Box::pin(async move {
            let Some(row) = sqlx::query(
                "SELECT code, percent_bps, active, valid_from, valid_until FROM coupons WHERE code = $1",
            )
            .bind(Coupon::normalize_code(code))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            else {
                return Ok(None);
            };

            let percent_bps: i32 = row.try_get("percent_bps").map_err(db_err)?;
            Ok(Some(Coupon {
                code: row.try_get("code").map_err(db_err)?,
                percent_bps: u32::try_from(percent_bps).unwrap_or(0),
                active: row.try_get("active").map_err(db_err)?,
                valid_from: row.try_get("valid_from").map_err(db_err)?,
                valid_until: row.try_get("valid_until").map_err(db_err)?,
            }))
        })
    }
}
