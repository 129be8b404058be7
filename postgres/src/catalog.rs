use crate::PgStorefront;
use crate::rows::{self, PRODUCT_COLUMNS, db_err, to_db_quantity};
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use storefront_core::ProductId;
use storefront_core::catalog::{CategorySummary, Product, ProductFilter};
use storefront_core::store::{CatalogStore, StoreError, StoreFuture};

impl CatalogStore for PgStorefront {
    fn product(&self, id: ProductId) -> StoreFuture<'_, Option<Product>> {
        Box::pin(async move {
            sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"))
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?
                .map(|row| rows::product(&row))
                .transpose()
                .map_err(db_err)
        })
    }

    fn products<'a>(&'a self, filter: &'a ProductFilter) -> StoreFuture<'a, Vec<Product>> {
        Box::pin(async move {
            let mut query: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE TRUE"));
            if !filter.include_inactive {
                query.push(" AND p.active");
            }
            if let Some(category_id) = filter.category_id {
                query.push(" AND p.category_id = ").push_bind(*category_id.as_uuid());
            }
            if filter.on_sale {
                query.push(" AND p.promotional_price_cents IS NOT NULL");
            }
            if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                let pattern = format!("%{search}%");
                query
                    .push(" AND (p.name ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR p.sku ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            query.push(" ORDER BY p.created_at DESC, p.name");
            if let Some(limit) = filter.limit {
                query.push(" LIMIT ").push_bind(i64::from(limit));
            }

            query
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?
                .iter()
                .map(rows::product)
                .collect::<Result<_, _>>()
                .map_err(db_err)
        })
    }

    fn categories(&self) -> StoreFuture<'_, Vec<CategorySummary>> {
        Box::pin(async move {
            sqlx::query(
                r"
                SELECT c.id, c.name, c.description, c.active,
                       COUNT(p.id) FILTER (WHERE p.active) AS product_count
                FROM categories c
                LEFT JOIN products p ON p.category_id = c.id
                WHERE c.active
                GROUP BY c.id
                ORDER BY c.name
                ",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(rows::category_summary)
            .collect::<Result<_, _>>()
            .map_err(db_err)
        })
    }

    fn set_stock(
        &self,
        id: ProductId,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Option<Product>> {
        Box::pin(async move {
            sqlx::query(&format!(
                "UPDATE products p SET stock_quantity = $2, updated_at = $3 \
                 WHERE p.id = $1 RETURNING {PRODUCT_COLUMNS}"
            ))
            .bind(*id.as_uuid())
            .bind(to_db_quantity(quantity))
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(|row| rows::product(&row))
            .transpose()
            .map_err(db_err)
        })
    }

    fn delete_product(&self, id: ProductId) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            let referenced: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM order_items WHERE product_id = $1)")
                    .bind(*id.as_uuid())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(db_err)?;
            if referenced {
                return Err(StoreError::Conflict(format!(
                    "product {id} is referenced by order items"
                )));
            }

            // Cart and wishlist rows go with the product (ON DELETE CASCADE).
            let result = sqlx::query("DELETE FROM products WHERE id = $1")
                .bind(*id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| match &e {
                    sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                        StoreError::Conflict(format!("product {id} is referenced by order items"))
                    }
                    _ => db_err(e),
                })?;
            if result.rows_affected() == 0 {
                return Err(StoreError::not_found("product", id));
            }

            tx.commit().await.map_err(db_err)?;
            Ok(())
        })
    }
}
