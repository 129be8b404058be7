//! In-memory implementation of every store trait.
//!
//! All tables live behind one mutex. Each trait method takes the lock once,
//! so guarded upserts, order placement and cancellation are atomic exactly like
//! their transactional SQL counterparts.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use storefront_core::cart::{CartItem, CartLine, MAX_QUANTITY};
use storefront_core::catalog::{Category, CategorySummary, Product, ProductFilter};
use storefront_core::checkout::{Coupon, OrderDraft};
use storefront_core::dashboard::{DailyRevenue, DashboardCounts, RecentOrder};
use storefront_core::order::{Order, OrderItem, OrderStatus, PaymentStatus, order_number};
use storefront_core::store::{
    CartStore, CatalogStore, CouponStore, DashboardQueries, OrderStore, StoreError, StoreFuture,
    Storefront, WishlistStore,
};
use storefront_core::{CartItemId, Money, OrderId, OrderItemId, ProductId, UserId};

#[derive(Debug, Default)]
struct Tables {
    categories: Vec<Category>,
    products: HashMap<ProductId, Product>,
    cart: Vec<CartItem>,
    orders: Vec<Order>,
    wishlist: Vec<(UserId, ProductId, DateTime<Utc>)>,
    coupons: HashMap<String, Coupon>,
    order_sequences: HashMap<NaiveDate, u32>,
}

impl Tables {
    fn line(&self, item: &CartItem) -> Option<CartLine> {
        self.products.get(&item.product_id).map(|product| CartLine {
            item: item.clone(),
            product: product.clone(),
        })
    }

    fn order_mut(&mut self, id: OrderId) -> Result<&mut Order, StoreError> {
        self.orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    fn counts_by_category(&self, only_active: bool) -> Vec<CategorySummary> {
        let mut summaries: Vec<CategorySummary> = self
            .categories
            .iter()
            .filter(|c| !only_active || c.active)
            .map(|c| CategorySummary {
                category: c.clone(),
                product_count: self
                    .products
                    .values()
                    .filter(|p| p.category_id == c.id && (!only_active || p.active))
                    .count() as u64,
            })
            .collect();
        summaries.sort_by(|a, b| a.category.name.cmp(&b.category.name));
        summaries
    }
}

/// In-memory storefront for fast, deterministic tests.
///
/// Clones share the same tables.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStorefront {
    tables: Arc<Mutex<Tables>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryStorefront {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with a database error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database("connection refused".to_string()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".to_string()))
    }

    fn seed<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self
            .tables
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut tables)
    }

    /// Insert a category and return it.
    pub fn insert_category(&self, category: Category) -> Category {
        self.seed(|t| t.categories.push(category.clone()));
        category
    }

    /// Insert or replace a product and return it.
    pub fn insert_product(&self, product: Product) -> Product {
        self.seed(|t| t.products.insert(product.id, product.clone()));
        product
    }

    /// Insert a coupon under its normalised code.
    pub fn insert_coupon(&self, coupon: Coupon) {
        self.seed(|t| t.coupons.insert(Coupon::normalize_code(&coupon.code), coupon));
    }

    /// Current stock of a product.
    #[must_use]
    pub fn stock_of(&self, id: ProductId) -> Option<u32> {
        self.seed(|t| t.products.get(&id).map(|p| p.stock_quantity))
    }

    /// Overwrite fields of a stored product.
    pub fn update_product(&self, id: ProductId, f: impl FnOnce(&mut Product)) {
        self.seed(|t| {
            if let Some(product) = t.products.get_mut(&id) {
                f(product);
            }
        });
    }

    /// Number of persisted orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.seed(|t| t.orders.len())
    }

    /// Number of persisted order lines.
    #[must_use]
    pub fn order_item_count(&self) -> usize {
        self.seed(|t| t.orders.iter().map(|o| o.items.len()).sum())
    }
}

impl CatalogStore for InMemoryStorefront {
    fn product(&self, id: ProductId) -> StoreFuture<'_, Option<Product>> {
        Box::pin(async move { Ok(self.tables()?.products.get(&id).cloned()) })
    }

    fn products<'a>(&'a self, filter: &'a ProductFilter) -> StoreFuture<'a, Vec<Product>> {
        Box::pin(async move {
            let tables = self.tables()?;
            let mut products: Vec<Product> = tables
                .products
                .values()
                .filter(|p| filter.matches(p))
                .cloned()
                .collect();
            products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.name.cmp(&b.name)));
            if let Some(limit) = filter.limit {
                products.truncate(limit as usize);
            }
            Ok(products)
        })
    }

    fn categories(&self) -> StoreFuture<'_, Vec<CategorySummary>> {
        Box::pin(async move { Ok(self.tables()?.counts_by_category(true)) })
    }

    fn set_stock(
        &self,
        id: ProductId,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Option<Product>> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            Ok(tables.products.get_mut(&id).map(|p| {
                p.stock_quantity = quantity;
                p.updated_at = at;
                p.clone()
            }))
        })
    }

    fn delete_product(&self, id: ProductId) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            if !tables.products.contains_key(&id) {
                return Err(StoreError::not_found("product", id));
            }
            let referenced = tables
                .orders
                .iter()
                .flat_map(|o| &o.items)
                .any(|i| i.product_id == id);
            if referenced {
                return Err(StoreError::Conflict(format!(
                    "product {id} is referenced by order items"
                )));
            }
            tables.products.remove(&id);
            tables.cart.retain(|i| i.product_id != id);
            tables.wishlist.retain(|(_, p, _)| *p != id);
            Ok(())
        })
    }
}

impl CartStore for InMemoryStorefront {
    fn cart_lines(&self, user_id: UserId) -> StoreFuture<'_, Vec<CartLine>> {
        Box::pin(async move {
            let tables = self.tables()?;
            Ok(tables
                .cart
                .iter()
                .filter(|i| i.user_id == user_id)
                .filter_map(|i| tables.line(i))
                .collect())
        })
    }

    fn cart_line(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> StoreFuture<'_, Option<CartLine>> {
        Box::pin(async move {
            let tables = self.tables()?;
            Ok(tables
                .cart
                .iter()
                .find(|i| i.id == item_id && i.user_id == user_id)
                .and_then(|i| tables.line(i)))
        })
    }

    fn cart_quantity(&self, user_id: UserId, product_id: ProductId) -> StoreFuture<'_, u32> {
        Box::pin(async move {
            Ok(self
                .tables()?
                .cart
                .iter()
                .find(|i| i.user_id == user_id && i.product_id == product_id)
                .map_or(0, |i| i.quantity))
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
            let mut tables = self.tables()?;
            let Some(product) = tables.products.get(&product_id) else {
                return Ok(None);
            };
            let limit = product.stock_quantity.min(MAX_QUANTITY);
            if !product.active || quantity > limit {
                return Ok(None);
            }

            if let Some(item) = tables
                .cart
                .iter_mut()
                .find(|i| i.user_id == user_id && i.product_id == product_id)
            {
                let total = item.quantity.saturating_add(quantity);
                if total > limit {
                    return Ok(None);
                }
                item.quantity = total;
                item.updated_at = at;
                return Ok(Some(item.clone()));
            }

            let item = CartItem {
                id: CartItemId::new(),
                user_id,
                product_id,
                quantity,
                created_at: at,
                updated_at: at,
            };
            tables.cart.push(item.clone());
            Ok(Some(item))
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
            let mut tables = self.tables()?;
            let Some(product_id) = tables
                .cart
                .iter()
                .find(|i| i.id == item_id && i.user_id == user_id)
                .map(|i| i.product_id)
            else {
                return Ok(None);
            };
            let allowed = tables.products.get(&product_id).is_some_and(|p| {
                p.active && quantity >= 1 && quantity <= p.stock_quantity.min(MAX_QUANTITY)
            });
            if !allowed {
                return Ok(None);
            }
            Ok(tables.cart.iter_mut().find(|i| i.id == item_id).map(|item| {
                item.quantity = quantity;
                item.updated_at = at;
                item.clone()
            }))
        })
    }

    fn remove_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> StoreFuture<'_, Option<CartItem>> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            let position = tables
                .cart
                .iter()
                .position(|i| i.id == item_id && i.user_id == user_id);
            Ok(position.map(|idx| tables.cart.remove(idx)))
        })
    }

    fn clear_cart(&self, user_id: UserId) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            let before = tables.cart.len();
            tables.cart.retain(|i| i.user_id != user_id);
            Ok((before - tables.cart.len()) as u64)
        })
    }

    fn cart_count(&self, user_id: UserId) -> StoreFuture<'_, u32> {
        Box::pin(async move {
            Ok(self
                .tables()?
                .cart
                .iter()
                .filter(|i| i.user_id == user_id)
                .map(|i| i.quantity)
                .sum())
        })
    }
}

impl OrderStore for InMemoryStorefront {
    fn place_order(&self, draft: OrderDraft) -> StoreFuture<'_, Order> {
        Box::pin(async move {
            let mut tables = self.tables()?;

            let in_cart: HashMap<ProductId, u32> = tables
                .cart
                .iter()
                .filter(|i| i.user_id == draft.user_id)
                .map(|i| (i.product_id, i.quantity))
                .collect();
            if in_cart.is_empty() {
                return Err(StoreError::EmptyCart);
            }

            // Check every line before touching anything.
            let mut needed: HashMap<ProductId, u32> = HashMap::new();
            for item in &draft.items {
                *needed.entry(item.product_id).or_default() += item.quantity;
            }
            if in_cart != needed {
                return Err(StoreError::CartChanged);
            }
            for (product_id, requested) in &needed {
                let available = tables
                    .products
                    .get(product_id)
                    .filter(|p| p.active)
                    .map_or(0, |p| p.stock_quantity);
                if available < *requested {
                    return Err(StoreError::InsufficientStock {
                        product_id: *product_id,
                        requested: *requested,
                        available,
                    });
                }
            }

            let day = draft.placed_at.date_naive();
            let sequence = {
                let seq = tables.order_sequences.entry(day).or_insert(0);
                *seq += 1;
                *seq
            };

            for (product_id, requested) in &needed {
                if let Some(product) = tables.products.get_mut(product_id) {
                    product.stock_quantity -= requested;
                    product.updated_at = draft.placed_at;
                }
            }
            tables
                .cart
                .retain(|i| i.user_id != draft.user_id || !needed.contains_key(&i.product_id));

            let id = OrderId::new();
            let order = Order {
                id,
                order_number: order_number(day, sequence),
                user_id: draft.user_id,
                status: OrderStatus::Pending,
                payment_status: PaymentStatus::Pending,
                subtotal: draft.subtotal,
                shipping_cost: draft.shipping_cost,
                discount: draft.discount,
                total: draft.total,
                coupon_code: draft.coupon_code,
                shipping_address: draft.shipping_address,
                billing_address: draft.billing_address,
                notes: draft.notes,
                cancellation_reason: None,
                cancelled_at: None,
                items: draft
                    .items
                    .into_iter()
                    .map(|i| OrderItem {
                        id: OrderItemId::new(),
                        order_id: id,
                        product_id: i.product_id,
                        product_name: i.product_name,
                        sku: i.sku,
                        unit_price: i.unit_price,
                        quantity: i.quantity,
                        line_total: i.line_total,
                    })
                    .collect(),
                created_at: draft.placed_at,
                updated_at: draft.placed_at,
            };
            tables.orders.push(order.clone());
            Ok(order)
        })
    }

    fn order(&self, id: OrderId) -> StoreFuture<'_, Option<Order>> {
        Box::pin(async move { Ok(self.tables()?.orders.iter().find(|o| o.id == id).cloned()) })
    }

    fn orders_for_user(&self, user_id: UserId) -> StoreFuture<'_, Vec<Order>> {
        Box::pin(async move {
            let mut orders: Vec<Order> = self
                .tables()?
                .orders
                .iter()
                .filter(|o| o.user_id == user_id)
                .cloned()
                .collect();
            orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(orders)
        })
    }

    fn cancel_order(
        &self,
        id: OrderId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            let order = tables.order_mut(id)?;
            if !order.status.can_cancel() {
                return Err(StoreError::InvalidTransition {
                    from: order.status,
                    to: OrderStatus::Cancelled,
                });
            }
            order.status = OrderStatus::Cancelled;
            order.cancellation_reason = reason;
            order.cancelled_at = Some(at);
            order.updated_at = at;
            let order = order.clone();

            for item in &order.items {
                if let Some(product) = tables.products.get_mut(&item.product_id) {
                    product.stock_quantity += item.quantity;
                    product.updated_at = at;
                }
            }
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
            let mut tables = self.tables()?;
            let order = tables.order_mut(id)?;
            if to == OrderStatus::Cancelled || !order.status.can_transition_to(to) {
                return Err(StoreError::InvalidTransition {
                    from: order.status,
                    to,
                });
            }
            order.status = to;
            order.updated_at = at;
            Ok(order.clone())
        })
    }

    fn update_payment_status(
        &self,
        id: OrderId,
        to: PaymentStatus,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            let order = tables.order_mut(id)?;
            if !order.payment_status.can_transition_to(to) {
                return Err(StoreError::InvalidPaymentTransition {
                    from: order.payment_status,
                    to,
                });
            }
            order.payment_status = to;
            order.updated_at = at;
            Ok(order.clone())
        })
    }
}

impl WishlistStore for InMemoryStorefront {
    fn wishlist(&self, user_id: UserId) -> StoreFuture<'_, Vec<Product>> {
        Box::pin(async move {
            let tables = self.tables()?;
            let mut entries: Vec<&(UserId, ProductId, DateTime<Utc>)> =
                tables.wishlist.iter().filter(|(u, _, _)| *u == user_id).collect();
            entries.sort_by(|a, b| b.2.cmp(&a.2));
            Ok(entries
                .into_iter()
                .filter_map(|(_, p, _)| tables.products.get(p).cloned())
                .collect())
        })
    }

    fn wishlist_contains(&self, user_id: UserId, product_id: ProductId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            Ok(self
                .tables()?
                .wishlist
                .iter()
                .any(|(u, p, _)| *u == user_id && *p == product_id))
        })
    }

    fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            if !tables.products.contains_key(&product_id) {
                return Err(StoreError::not_found("product", product_id));
            }
            if tables
                .wishlist
                .iter()
                .any(|(u, p, _)| *u == user_id && *p == product_id)
            {
                return Ok(false);
            }
            tables.wishlist.push((user_id, product_id, at));
            Ok(true)
        })
    }

    fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            let before = tables.wishlist.len();
            tables
                .wishlist
                .retain(|(u, p, _)| !(*u == user_id && *p == product_id));
            Ok(tables.wishlist.len() < before)
        })
    }
}

impl CouponStore for InMemoryStorefront {
    fn coupon<'a>(&'a self, code: &'a str) -> StoreFuture<'a, Option<Coupon>> {
        Box::pin(async move {
            Ok(self
                .tables()?
                .coupons
                .get(&Coupon::normalize_code(code))
                .cloned())
        })
    }
}

impl DashboardQueries for InMemoryStorefront {
    fn dashboard_counts(&self) -> StoreFuture<'_, DashboardCounts> {
        Box::pin(async move {
            let tables = self.tables()?;
            let live = || {
                tables
                    .orders
                    .iter()
                    .filter(|o| o.status != OrderStatus::Cancelled)
            };
            let mut customers: Vec<UserId> = tables.orders.iter().map(|o| o.user_id).collect();
            customers.sort_unstable();
            customers.dedup();
            Ok(DashboardCounts {
                total_products: tables.products.len() as u64,
                active_products: tables.products.values().filter(|p| p.active).count() as u64,
                total_categories: tables.categories.len() as u64,
                total_orders: tables.orders.len() as u64,
                pending_orders: tables
                    .orders
                    .iter()
                    .filter(|o| o.status == OrderStatus::Pending)
                    .count() as u64,
                total_customers: customers.len() as u64,
                low_stock_products: tables.products.values().filter(|p| p.is_low_stock()).count()
                    as u64,
                total_revenue: live().map(|o| o.total).sum(),
            })
        })
    }

    fn recent_orders(&self, limit: u32) -> StoreFuture<'_, Vec<RecentOrder>> {
        Box::pin(async move {
            let tables = self.tables()?;
            let mut orders: Vec<&Order> = tables.orders.iter().collect();
            orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(orders
                .into_iter()
                .take(limit as usize)
                .map(|o| RecentOrder {
                    id: o.id,
                    order_number: o.order_number.clone(),
                    user_id: o.user_id,
                    status: o.status,
                    total: o.total,
                    created_at: o.created_at,
                })
                .collect())
        })
    }

    fn low_stock_products(&self, limit: u32) -> StoreFuture<'_, Vec<Product>> {
        Box::pin(async move {
            let tables = self.tables()?;
            let mut products: Vec<Product> = tables
                .products
                .values()
                .filter(|p| p.is_low_stock())
                .cloned()
                .collect();
            products.sort_by(|a, b| {
                a.stock_quantity
                    .cmp(&b.stock_quantity)
                    .then_with(|| a.name.cmp(&b.name))
            });
            products.truncate(limit as usize);
            Ok(products)
        })
    }

    fn category_counts(&self) -> StoreFuture<'_, Vec<CategorySummary>> {
        Box::pin(async move { Ok(self.tables()?.counts_by_category(false)) })
    }

    fn daily_revenue(&self, since: DateTime<Utc>) -> StoreFuture<'_, Vec<DailyRevenue>> {
        Box::pin(async move {
            let tables = self.tables()?;
            let mut by_day: HashMap<NaiveDate, (Money, u64)> = HashMap::new();
            for order in tables
                .orders
                .iter()
                .filter(|o| o.status != OrderStatus::Cancelled && o.created_at >= since)
            {
                let entry = by_day.entry(order.created_at.date_naive()).or_default();
                entry.0 = entry.0 + order.total;
                entry.1 += 1;
            }
            let mut rows: Vec<DailyRevenue> = by_day
                .into_iter()
                .map(|(date, (revenue, orders))| DailyRevenue {
                    date,
                    revenue,
                    orders,
                })
                .collect();
            rows.sort_by_key(|r| r.date);
            Ok(rows)
        })
    }
}

impl Storefront for InMemoryStorefront {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.tables()?;
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::mocks::test_clock;
    use storefront_core::checkout::{ShippingRates, plan};
    use storefront_core::environment::Clock;

    fn seeded() -> (InMemoryStorefront, Product) {
        let store = InMemoryStorefront::new();
        let category = store.insert_category(fixtures::category("Books"));
        let product = store.insert_product(fixtures::product(category.id, "Dune", 10_000, 10));
        (store, product)
    }

    #[tokio::test]
    async fn guarded_add_refuses_to_exceed_stock() {
        let (store, product) = seeded();
        let user = UserId::new();
        let now = test_clock().now();

        assert!(store.add_to_cart(user, product.id, 8, now).await.unwrap().is_some());
        assert!(store.add_to_cart(user, product.id, 3, now).await.unwrap().is_none());
        assert_eq!(store.cart_count(user).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn place_order_is_all_or_nothing() {
        let (store, product) = seeded();
        let user = UserId::new();
        let clock = test_clock();
        store.add_to_cart(user, product.id, 4, clock.now()).await.unwrap();
        let lines = store.cart_lines(user).await.unwrap();
        let draft = plan(
            user,
            &lines,
            fixtures::shipping_data(),
            None,
            &ShippingRates::default(),
            clock.now(),
        )
        .unwrap();

        // Stock drops after planning.
        store.update_product(product.id, |p| p.stock_quantity = 3);

        let err = store.place_order(draft).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { available: 3, .. }));
        assert_eq!(store.order_count(), 0);
        assert_eq!(store.stock_of(product.id), Some(3));
        assert_eq!(store.cart_count(user).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn lines_added_after_planning_refuse_the_order() {
        let (store, dune) = seeded();
        let category = store.insert_category(fixtures::category("Maps"));
        let atlas = store.insert_product(fixtures::product(category.id, "Atlas", 5_000, 5));
        let user = UserId::new();
        let clock = test_clock();
        store.add_to_cart(user, dune.id, 1, clock.now()).await.unwrap();
        let lines = store.cart_lines(user).await.unwrap();
        let draft = plan(
            user,
            &lines,
            fixtures::shipping_data(),
            None,
            &ShippingRates::default(),
            clock.now(),
        )
        .unwrap();

        // Another tab adds a line between planning and placing.
        store.add_to_cart(user, atlas.id, 2, clock.now()).await.unwrap();

        assert!(matches!(
            store.place_order(draft).await,
            Err(StoreError::CartChanged)
        ));
        assert_eq!(store.order_count(), 0);
        assert_eq!(store.stock_of(dune.id), Some(10));
        assert_eq!(store.cart_count(user).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn placing_removes_only_the_ordered_users_lines() {
        let (store, product) = seeded();
        let buyer = UserId::new();
        let other = UserId::new();
        let clock = test_clock();
        store.add_to_cart(buyer, product.id, 2, clock.now()).await.unwrap();
        store.add_to_cart(other, product.id, 1, clock.now()).await.unwrap();
        let lines = store.cart_lines(buyer).await.unwrap();
        let draft = plan(
            buyer,
            &lines,
            fixtures::shipping_data(),
            None,
            &ShippingRates::default(),
            clock.now(),
        )
        .unwrap();

        store.place_order(draft).await.unwrap();

        assert_eq!(store.cart_count(buyer).await.unwrap(), 0);
        assert_eq!(store.cart_count(other).await.unwrap(), 1);
        assert_eq!(store.stock_of(product.id), Some(8));
    }

    #[tokio::test]
    async fn order_numbers_count_per_day() {
        let (store, product) = seeded();
        let clock = test_clock();
        let mut numbers = vec![];
        for _ in 0..2 {
            let user = UserId::new();
            store.add_to_cart(user, product.id, 1, clock.now()).await.unwrap();
            let lines = store.cart_lines(user).await.unwrap();
            let draft = plan(
                user,
                &lines,
                fixtures::shipping_data(),
                None,
                &ShippingRates::default(),
                clock.now(),
            )
            .unwrap();
            numbers.push(store.place_order(draft).await.unwrap().order_number);
        }
        assert_eq!(numbers, ["ORD-20250101-0001", "ORD-20250101-0002"]);
    }

    #[tokio::test]
    async fn delete_refused_while_referenced() {
        let (store, product) = seeded();
        let user = UserId::new();
        let clock = test_clock();
        store.add_to_cart(user, product.id, 1, clock.now()).await.unwrap();
        let lines = store.cart_lines(user).await.unwrap();
        let draft = plan(
            user,
            &lines,
            fixtures::shipping_data(),
            None,
            &ShippingRates::default(),
            clock.now(),
        )
        .unwrap();
        store.place_order(draft).await.unwrap();

        assert!(matches!(
            store.delete_product(product.id).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn failing_store_reports_database_errors() {
        let (store, _) = seeded();
        store.set_failing(true);
        assert!(matches!(store.ping().await, Err(StoreError::Database(_))));
        store.set_failing(false);
        assert!(store.ping().await.is_ok());
    }
}
