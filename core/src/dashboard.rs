//! Admin dashboard aggregates.

use crate::catalog::{CategorySummary, Product};
use crate::ids::{OrderId, UserId};
use crate::money::Money;
use crate::order::OrderStatus;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Headline numbers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardCounts {
    /// Every product row
    pub total_products: u64,
    /// Products offered in the storefront
    pub active_products: u64,
    /// Every category row
    pub total_categories: u64,
    /// Every order row
    pub total_orders: u64,
    /// Orders still pending
    pub pending_orders: u64,
    /// Distinct users with at least one order
    pub total_customers: u64,
    /// Products at or below their minimum stock
    pub low_stock_products: u64,
    /// Sum of totals of non-cancelled orders
    pub total_revenue: Money,
}

/// Row of the recent orders table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentOrder {
    /// Order identifier
    pub id: OrderId,
    /// Order number
    pub order_number: String,
    /// Customer
    pub user_id: UserId,
    /// Fulfilment status
    pub status: OrderStatus,
    /// Amount charged
    pub total: Money,
    /// Placement time
    pub created_at: DateTime<Utc>,
}

/// Revenue of one UTC day as returned by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRevenue {
    /// The day
    pub date: NaiveDate,
    /// Sum of order totals
    pub revenue: Money,
    /// Number of orders
    pub orders: u64,
}

/// Point of the revenue chart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenuePoint {
    /// The day
    pub date: NaiveDate,
    /// `dd/mm`
    pub label: String,
    /// Sum of order totals, zero on days without orders
    pub revenue: Money,
    /// Number of orders
    pub orders: u64,
}

/// Everything the dashboard shows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardData {
    /// Headline numbers
    pub counts: DashboardCounts,
    /// Newest orders
    pub recent_orders: Vec<RecentOrder>,
    /// Products needing restock, lowest stock first
    pub low_stock_products: Vec<Product>,
    /// Products per category
    pub category_counts: Vec<CategorySummary>,
    /// One point per day, oldest first
    pub revenue_series: Vec<RevenuePoint>,
}

/// First day of a `days`-long window ending on `today`.
#[must_use]
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

/// Zero-filled series of `days` points ending on `today`, oldest first.
///
/// Rows outside the window are ignored.
#[must_use]
pub fn revenue_series(today: NaiveDate, days: u32, rows: &[DailyRevenue]) -> Vec<RevenuePoint> {
    let by_day: HashMap<NaiveDate, &DailyRevenue> = rows.iter().map(|r| (r.date, r)).collect();
    window_start(today, days)
        .iter_days()
        .take_while(|day| *day <= today)
        .map(|date| {
            let row = by_day.get(&date);
            RevenuePoint {
                date,
                label: date.format("%d/%m").to_string(),
                revenue: row.map_or(Money::ZERO, |r| r.revenue),
                orders: row.map_or(0, |r| r.orders),
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_window_is_zero_filled() {
        let series = revenue_series(day(2024, 3, 30), 30, &[]);
        assert_eq!(series.len(), 30);
        assert!(series.iter().all(|p| p.revenue == Money::ZERO && p.orders == 0));
        assert_eq!(series[0].date, day(2024, 3, 1));
        assert_eq!(series[29].label, "30/03");
    }

    #[test]
    fn rows_land_on_their_day_oldest_first() {
        let rows = [
            DailyRevenue { date: day(2024, 3, 29), revenue: Money::from_units(50), orders: 1 },
            DailyRevenue { date: day(2024, 2, 1), revenue: Money::from_units(999), orders: 9 },
        ];
        let series = revenue_series(day(2024, 3, 30), 30, &rows);
        assert_eq!(series[28].revenue, Money::from_units(50));
        assert_eq!(series.iter().map(|p| p.orders).sum::<u64>(), 1);
        assert!(series.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn window_crosses_year_boundary() {
        let series = revenue_series(day(2024, 1, 2), 3, &[]);
        let labels: Vec<&str> = series.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["31/12", "01/01", "02/01"]);
    }
}
