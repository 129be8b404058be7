//! `PostgreSQL` storage for the storefront.
//!
//! [`PgStorefront`] implements every store trait from `storefront-core` over a
//! sqlx connection pool. Operations that span tables run in one transaction:
//!
//! - Cart adds are a single guarded upsert, so concurrent adds cannot push a
//!   line past the product's stock
//! - Order placement allocates the order number, decrements stock with a
//!   conditional update per product, writes the order and empties the cart
//! - Cancellation locks the order row before restoring stock
//!
//! # Example
//!
//! ```no_run
//! use storefront_postgres::PgStorefront;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PgStorefront::connect("postgres://localhost/storefront").await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use storefront_core::store::{StoreError, StoreFuture, Storefront};

mod cart;
mod catalog;
mod dashboard;
mod orders;
mod rows;
mod wishlist;

/// Pool sizing for [`PgStorefront::connect_with`].
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    /// Upper bound of open connections
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// How long to wait for a connection
    pub connect_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// `PostgreSQL` implementation of [`Storefront`].
#[derive(Clone, Debug)]
pub struct PgStorefront {
    pool: PgPool,
}

impl PgStorefront {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with default pool options.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        Self::connect_with(database_url, PoolOptions::default()).await
    }

    /// Connect with explicit pool options.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect_with(database_url: &str, options: PoolOptions) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .min_connections(options.min_connections)
            .acquire_timeout(options.connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;
        tracing::info!(
            max_connections = options.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Storefront for PgStorefront {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(rows::db_err)?;
            Ok(())
        })
    }
}
