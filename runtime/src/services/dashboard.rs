//! Admin dashboard aggregates.
//!
//! Each section is cached under its own `dashboard:` key and tagged with
//! [`CacheTag::Dashboard`] plus the data it is computed from, so a stock change
//! refreshes the low stock table while clearing the dashboard drops every
//! section at once.

use crate::Environment;
use chrono::NaiveTime;
use storefront_core::cache::CacheTag;
use storefront_core::catalog::{CategorySummary, Product};
use storefront_core::dashboard::{
    DashboardCounts, DashboardData, RecentOrder, RevenuePoint, revenue_series, window_start,
};
use storefront_core::store::StoreError;

/// Counts cache key.
pub const COUNTS_KEY: &str = "dashboard:counts";
/// Recent orders cache key.
pub const RECENT_ORDERS_KEY: &str = "dashboard:recent_orders";
/// Low stock cache key.
pub const LOW_STOCK_KEY: &str = "dashboard:low_stock_products";
/// Category counts cache key.
pub const CATEGORY_COUNTS_KEY: &str = "dashboard:category_counts";

/// Revenue series cache key for a window of `days`.
#[must_use]
pub fn revenue_key(days: u32) -> String {
    format!("dashboard:revenue_series:{days}")
}

/// Cached dashboard reads.
#[derive(Clone)]
pub struct DashboardService {
    env: Environment,
}

impl DashboardService {
    /// Create the service.
    #[must_use]
    pub const fn new(env: Environment) -> Self {
        Self { env }
    }

    /// Every dashboard section.
    ///
    /// # Errors
    ///
    /// Storage failures only; cache failures fall back to direct queries.
    pub async fn data(&self) -> Result<DashboardData, StoreError> {
        let (counts, recent_orders, low_stock_products, category_counts, revenue_series) = tokio::try_join!(
            self.counts(),
            self.recent_orders(),
            self.low_stock_products(),
            self.category_counts(),
            self.revenue_series(),
        )?;
        Ok(DashboardData {
            counts,
            recent_orders,
            low_stock_products,
            category_counts,
            revenue_series,
        })
    }

    /// Headline numbers.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn counts(&self) -> Result<DashboardCounts, StoreError> {
        let store = &self.env.store;
        self.env
            .cache
            .remember(
                COUNTS_KEY,
                self.env.settings.dashboard_ttl(),
                &[CacheTag::Dashboard, CacheTag::Product, CacheTag::Category, CacheTag::Order],
                || store.dashboard_counts(),
            )
            .await
    }

    /// Newest orders.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn recent_orders(&self) -> Result<Vec<RecentOrder>, StoreError> {
        let store = &self.env.store;
        let limit = self.env.settings.recent_orders_limit;
        self.env
            .cache
            .remember(
                RECENT_ORDERS_KEY,
                self.env.settings.dashboard_ttl(),
                &[CacheTag::Dashboard, CacheTag::Order],
                || store.recent_orders(limit),
            )
            .await
    }

    /// Products at or below their minimum stock, lowest first.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn low_stock_products(&self) -> Result<Vec<Product>, StoreError> {
        let store = &self.env.store;
        let limit = self.env.settings.low_stock_limit;
        self.env
            .cache
            .remember(
                LOW_STOCK_KEY,
                self.env.settings.dashboard_ttl(),
                &[CacheTag::Dashboard, CacheTag::Product],
                || store.low_stock_products(limit),
            )
            .await
    }

    /// Products per category.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn category_counts(&self) -> Result<Vec<CategorySummary>, StoreError> {
        let store = &self.env.store;
        self.env
            .cache
            .remember(
                CATEGORY_COUNTS_KEY,
                self.env.settings.dashboard_ttl(),
                &[CacheTag::Dashboard, CacheTag::Category, CacheTag::Product],
                || store.category_counts(),
            )
            .await
    }

    /// Daily revenue over the configured window, oldest first.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn revenue_series(&self) -> Result<Vec<RevenuePoint>, StoreError> {
        let store = &self.env.store;
        let days = self.env.settings.revenue_window_days;
        let today = self.env.clock.now().date_naive();
        self.env
            .cache
            .remember(
                &revenue_key(days),
                self.env.settings.dashboard_ttl(),
                &[CacheTag::Dashboard, CacheTag::Order],
                || async move {
                    let since = window_start(today, days).and_time(NaiveTime::MIN).and_utc();
                    let rows = store.daily_revenue(since).await?;
                    Ok(revenue_series(today, days, &rows))
                },
            )
            .await
    }

    /// Drop every cached dashboard section. Returns how many entries went.
    pub async fn clear_cache(&self) -> u64 {
        let removed = self.env.cache.flush(&[CacheTag::Dashboard]).await;
        tracing::info!(removed, "Dashboard cache cleared");
        removed
    }
}
