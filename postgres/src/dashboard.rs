use crate::PgStorefront;
use crate::rows::{self, PRODUCT_COLUMNS, db_err, from_db_count};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use storefront_core::catalog::{CategorySummary, Product};
use storefront_core::dashboard::{DailyRevenue, DashboardCounts, RecentOrder};
use storefront_core::order::OrderStatus;
use storefront_core::store::{DashboardQueries, StoreError, StoreFuture};
use storefront_core::{Money, OrderId, UserId};

impl DashboardQueries for PgStorefront {
    fn dashboard_counts(&self) -> StoreFuture<'_, DashboardCounts> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT
                    (SELECT COUNT(*) FROM products) AS total_products,
                    (SELECT COUNT(*) FROM products WHERE active) AS active_products,
                    (SELECT COUNT(*) FROM categories) AS total_categories,
                    (SELECT COUNT(*) FROM orders) AS total_orders,
                    (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders,
                    (SELECT COUNT(DISTINCT user_id) FROM orders) AS total_customers,
                    (SELECT COUNT(*) FROM products WHERE stock_quantity <= min_stock) AS low_stock_products,
                    (SELECT COALESCE(SUM(total_cents), 0)::BIGINT FROM orders
                     WHERE status <> 'cancelled') AS total_revenue
                ",
            )
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

            let count = |name: &str| row.try_get::<i64, _>(name).map(from_db_count).map_err(db_err);
            Ok(DashboardCounts {
                total_products: count("total_products")?,
                active_products: count("active_products")?,
                total_categories: count("total_categories")?,
                total_orders: count("total_orders")?,
                pending_orders: count("pending_orders")?,
                total_customers: count("total_customers")?,
                low_stock_products: count("low_stock_products")?,
                total_revenue: Money::from_cents(row.try_get("total_revenue").map_err(db_err)?),
            })
        })
    }

    fn recent_orders(&self, limit: u32) -> StoreFuture<'_, Vec<RecentOrder>> {
        Box::pin(async move {
            let records = sqlx::query(
                r"
                SELECT id, order_number, user_id, status, total_cents, created_at
                FROM orders
                ORDER BY created_at DESC, order_number DESC
                LIMIT $1
                ",
            )
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

            records
                .iter()
                .map(|row| -> Result<RecentOrder, StoreError> {
                    let status: String = row.try_get("status").map_err(db_err)?;
                    Ok(RecentOrder {
                        id: OrderId::from_uuid(row.try_get("id").map_err(db_err)?),
                        order_number: row.try_get("order_number").map_err(db_err)?,
                        user_id: UserId::from_uuid(row.try_get("user_id").map_err(db_err)?),
                        status: status
                            .parse::<OrderStatus>()
                            .map_err(|e| StoreError::Database(e.to_string()))?,
                        total: Money::from_cents(row.try_get("total_cents").map_err(db_err)?),
                        created_at: row.try_get("created_at").map_err(db_err)?,
                    })
                })
                .collect()
        })
    }

    fn low_stock_products(&self, limit: u32) -> StoreFuture<'_, Vec<Product>> {
        Box::pin(async move {
            sqlx::query(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products p \
                 WHERE p.stock_quantity <= p.min_stock \
                 ORDER BY p.stock_quantity, p.name LIMIT $1"
            ))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(rows::product)
            .collect::<Result<_, _>>()
            .map_err(db_err)
        })
    }

    fn category_counts(&self) -> StoreFuture<'_, Vec<CategorySummary>> {
        Box::pin(async move {
            sqlx::query(
                r"
                SELECT c.id, c.name, c.description, c.active, COUNT(p.id) AS product_count
                FROM categories c
                LEFT JOIN products p ON p.category_id = c.id
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

    fn daily_revenue(&self, since: DateTime<Utc>) -> StoreFuture<'_, Vec<DailyRevenue>> {
        Box::pin(async move {
            let records = sqlx::query(
                r"
                SELECT (created_at AT TIME ZONE 'UTC')::DATE AS day,
                       SUM(total_cents)::BIGINT AS revenue,
                       COUNT(*) AS orders
                FROM orders
                WHERE status <> 'cancelled' AND created_at >= $1
                GROUP BY day
                ORDER BY day
                ",
            )
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

            records
                .iter()
                .map(|row| -> Result<DailyRevenue, StoreError> {
                    Ok(DailyRevenue {
                        date: row.try_get::<NaiveDate, _>("day").map_err(db_err)?,
                        revenue: Money::from_cents(row.try_get("revenue").map_err(db_err)?),
                        orders: from_db_count(row.try_get("orders").map_err(db_err)?),
                    })
                })
                .collect()
        })
    }
}
