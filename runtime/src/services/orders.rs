//! Checkout and order lifecycle.

use super::cart::cart_count_key;
use crate::Environment;
use crate::metrics::OrderMetrics;
use storefront_core::cache::CacheTag;
use storefront_core::checkout::{CheckoutError, ShippingData, plan};
use storefront_core::event::DomainEvent;
use storefront_core::order::{Order, OrderError, OrderStatus, PaymentStatus};
use storefront_core::{OrderId, UserId};

/// Places, reads, advances and cancels orders.
#[derive(Clone)]
pub struct OrderService {
    env: Environment,
}

impl OrderService {
    /// Create the service.
    #[must_use]
    pub const fn new(env: Environment) -> Self {
        Self { env }
    }

    /// Turn the user's cart into an order.
    ///
    /// The cart is priced from a fresh read, then the store decrements stock,
    /// writes the order and empties the cart in one transaction. On any error
    /// nothing is persisted and the cart is left as it was.
    ///
    /// # Errors
    ///
    /// - `EmptyCart` when the cart has no lines
    /// - `InvalidShippingData` for blank address fields
    /// - `InvalidCoupon` for an unknown, inactive or expired code
    /// - `ProductNotAvailable` when a line cannot be fulfilled
    pub async fn checkout(
        &self,
        user_id: UserId,
        shipping: ShippingData,
        coupon_code: Option<&str>,
    ) -> Result<Order, CheckoutError> {
        let store = &self.env.store;
        let lines = store.cart_lines(user_id).await?;

        let code = coupon_code.map(str::trim).filter(|c| !c.is_empty());
        let coupon = match code {
            Some(code) => Some(
                store
                    .coupon(code)
                    .await?
                    .ok_or_else(|| CheckoutError::InvalidCoupon(code.to_string()))?,
            ),
            None => None,
        };

        let now = self.env.clock.now();
        let draft = plan(
            user_id,
            &lines,
            shipping,
            coupon.as_ref(),
            &self.env.settings.shipping_rates(),
            now,
        )?;
        let order = store.place_order(draft).await?;

        self.env.cache.forget(&cart_count_key(user_id)).await;
        self.env.cache.flush(&[CacheTag::Product, CacheTag::Order]).await;
        OrderMetrics::record_placed(order.total.cents());
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            %user_id,
            total = %order.total,
            "Order placed"
        );
        self.env.events.publish(DomainEvent::OrderPlaced {
            order_id: order.id,
            order_number: order.order_number.clone(),
            user_id,
            total: order.total,
            item_count: order.item_count(),
            at: now,
        });
        Ok(order)
    }

    /// One of the user's orders.
    ///
    /// # Errors
    ///
    /// `NotFound` when the order does not exist or belongs to someone else.
    pub async fn order_for_user(&self, user_id: UserId, order_id: OrderId) -> Result<Order, OrderError> {
        self.env
            .store
            .order(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(OrderError::NotFound(order_id))
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.env.store.orders_for_user(user_id).await?)
    }

    /// Any order, for administration.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub async fn order(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.env
            .store
            .order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))
    }

    /// Cancel one of the user's own orders.
    ///
    /// # Errors
    ///
    /// `NotFound` for someone else's order, `InvalidTransition` once the order
    /// has shipped or was already cancelled.
    pub async fn cancel_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
        reason: Option<String>,
    ) -> Result<Order, OrderError> {
        self.order_for_user(user_id, order_id).await?;
        self.cancel(order_id, reason).await
    }

    /// Cancel an order and put its units back in stock.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidTransition` when the order can no
    /// longer be cancelled.
    pub async fn cancel(&self, order_id: OrderId, reason: Option<String>) -> Result<Order, OrderError> {
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let now = self.env.clock.now();
        let order = self
            .env
            .store
            .cancel_order(order_id, reason, now)
            .await
            .map_err(|e| not_found_or(order_id, e))?;

        self.env.cache.flush(&[CacheTag::Product, CacheTag::Order]).await;
        OrderMetrics::record_cancelled();
        let restored_units = order.item_count();
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            restored_units,
            "Order cancelled"
        );
        self.env.events.publish(DomainEvent::OrderCancelled {
            order_id: order.id,
            order_number: order.order_number.clone(),
            user_id: order.user_id,
            reason: order.cancellation_reason.clone(),
            restored_units,
            at: now,
        });
        Ok(order)
    }

    /// Move an order to `to`.
    ///
    /// Forward moves go one step at a time; `Cancelled` goes through
    /// [`OrderService::cancel`] so stock is restored.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidTransition` for an illegal move.
    pub async fn update_status(&self, order_id: OrderId, to: OrderStatus) -> Result<Order, OrderError> {
        if to == OrderStatus::Cancelled {
            return self.cancel(order_id, None).await;
        }

        let from = self.order(order_id).await?.status;
        let now = self.env.clock.now();
        let order = self
            .env
            .store
            .update_order_status(order_id, to, now)
            .await
            .map_err(|e| not_found_or(order_id, e))?;

        self.env.cache.flush(&[CacheTag::Order]).await;
        tracing::info!(order_id = %order.id, %from, %to, "Order status changed");
        self.env.events.publish(DomainEvent::OrderStatusChanged {
            order_id: order.id,
            order_number: order.order_number.clone(),
            from,
            to,
            at: now,
        });
        Ok(order)
    }

    /// Move an order one step forward.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for delivered or cancelled orders.
    pub async fn advance_status(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let from = self.order(order_id).await?.status;
        let to = from
            .next()
            .ok_or(OrderError::InvalidTransition { from, to: from })?;
        self.update_status(order_id, to).await
    }

    /// Record a payment outcome.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidPaymentTransition` when refunding
    /// an unpaid order or changing a refunded one.
    pub async fn set_payment_status(
        &self,
        order_id: OrderId,
        to: PaymentStatus,
    ) -> Result<Order, OrderError> {
        let from = self.order(order_id).await?.payment_status;
        let now = self.env.clock.now();
        let order = self
            .env
            .store
            .update_payment_status(order_id, to, now)
            .await
            .map_err(|e| not_found_or(order_id, e))?;

        self.env.cache.flush(&[CacheTag::Order]).await;
        tracing::info!(order_id = %order.id, %from, %to, "Payment status changed");
        self.env.events.publish(DomainEvent::PaymentStatusChanged {
            order_id: order.id,
            order_number: order.order_number.clone(),
            from,
            to,
            at: now,
        });
        Ok(order)
    }
}

fn not_found_or(order_id: OrderId, err: storefront_core::store::StoreError) -> OrderError {
    match err {
        storefront_core::store::StoreError::NotFound { .. } => OrderError::NotFound(order_id),
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::services::CartService;
    use crate::test_support::Harness;
    use storefront_core::cart::Unavailability;
    use storefront_core::catalog::Product;
    use storefront_testing::fixtures;

    struct Shop {
        h: Harness,
        chess: Product,
        go: Product,
        cart: CartService,
        orders: OrderService,
    }

    fn shop() -> Shop {
        let h = Harness::new();
        let games = h.store.insert_category(fixtures::category("Games"));
        let chess = h.store.insert_product(fixtures::product(games.id, "Chess", 10_000, 5));
        let go = h.store.insert_product(fixtures::product(games.id, "Go", 5_000, 3));
        h.store.insert_coupon(fixtures::desconto10());
        let env = h.env();
        Shop {
            cart: CartService::new(env.clone()),
            orders: OrderService::new(env),
            h,
            chess,
            go,
        }
    }

    #[tokio::test]
    async fn checkout_moves_cart_into_an_order() {
        let s = shop();
        let user = UserId::new();
        s.cart.add_item(user, s.chess.id, 2).await.unwrap();
        s.cart.add_item(user, s.go.id, 1).await.unwrap();
        assert_eq!(s.cart.count(user).await.unwrap(), 3);

        let order = s
            .orders
            .checkout(user, fixtures::shipping_data(), Some(" desconto10 "))
            .await
            .unwrap();

        // 2 × 100.00 + 50.00, 10 % off, 1.5 kg ships for 15.00 + 2 × 2.50
        assert_eq!(order.subtotal.cents(), 25_000);
        assert_eq!(order.discount.cents(), 2_500);
        assert_eq!(order.shipping_cost.cents(), 2_000);
        assert_eq!(order.total.cents(), 24_500);
        assert_eq!(order.total, order.recomputed_total());
        assert_eq!(order.order_number, "ORD-20250101-0001");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.coupon_code.as_deref(), Some("DESCONTO10"));

        assert_eq!(s.h.store.stock_of(s.chess.id), Some(3));
        assert_eq!(s.h.store.stock_of(s.go.id), Some(2));
        assert_eq!(s.cart.count(user).await.unwrap(), 0);
        assert_eq!(s.h.events.event_types().last(), Some(&"OrderPlaced.v1"));
    }

    #[tokio::test]
    async fn empty_cart_cannot_check_out() {
        let s = shop();
        assert!(matches!(
            s.orders.checkout(UserId::new(), fixtures::shipping_data(), None).await,
            Err(CheckoutError::EmptyCart)
        ));
        assert_eq!(s.h.store.order_count(), 0);
    }

    #[tokio::test]
    async fn unknown_coupon_persists_nothing() {
        let s = shop();
        let user = UserId::new();
        s.cart.add_item(user, s.chess.id, 1).await.unwrap();

        let err = s
            .orders
            .checkout(user, fixtures::shipping_data(), Some("FREEBIE"))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::InvalidCoupon(code) if code == "FREEBIE"));
        assert_eq!(s.h.store.order_count(), 0);
        assert_eq!(s.cart.count(user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stock_drop_after_carting_aborts_checkout() {
        let s = shop();
        let user = UserId::new();
        s.cart.add_item(user, s.chess.id, 1).await.unwrap();
        s.cart.add_item(user, s.go.id, 3).await.unwrap();
        s.h.store.update_product(s.go.id, |p| p.stock_quantity = 1);

        let err = s
            .orders
            .checkout(user, fixtures::shipping_data(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::ProductNotAvailable {
                reason: Unavailability::InsufficientStock { available: 1, requested: 3 },
                ..
            }
        ));
        assert_eq!(s.h.store.stock_of(s.chess.id), Some(5));
        assert_eq!(s.h.store.order_count(), 0);
        assert_eq!(s.h.store.order_item_count(), 0);
        assert_eq!(s.cart.count(user).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn order_numbers_count_up_within_a_day() {
        let s = shop();
        let mut numbers = Vec::new();
        for _ in 0..2 {
            let user = UserId::new();
            s.cart.add_item(user, s.chess.id, 1).await.unwrap();
            let order = s.orders.checkout(user, fixtures::shipping_data(), None).await.unwrap();
            numbers.push(order.order_number);
        }
        assert_eq!(numbers, ["ORD-20250101-0001", "ORD-20250101-0002"]);
    }

    #[tokio::test]
    async fn cancelling_restores_stock_exactly_once() {
        let s = shop();
        let user = UserId::new();
        s.cart.add_item(user, s.chess.id, 2).await.unwrap();
        let order = s.orders.checkout(user, fixtures::shipping_data(), None).await.unwrap();
        assert_eq!(s.h.store.stock_of(s.chess.id), Some(3));

        let cancelled = s
            .orders
            .cancel_for_user(user, order.id, Some("changed my mind".to_string()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("changed my mind"));
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(s.h.store.stock_of(s.chess.id), Some(5));

        let again = s.orders.cancel_for_user(user, order.id, None).await;
        assert!(matches!(
            again,
            Err(OrderError::InvalidTransition { from: OrderStatus::Cancelled, .. })
        ));
        assert_eq!(s.h.store.stock_of(s.chess.id), Some(5));
    }

    #[tokio::test]
    async fn other_users_cannot_see_or_cancel() {
        let s = shop();
        let owner = UserId::new();
        s.cart.add_item(owner, s.chess.id, 1).await.unwrap();
        let order = s.orders.checkout(owner, fixtures::shipping_data(), None).await.unwrap();

        let stranger = UserId::new();
        assert!(matches!(
            s.orders.order_for_user(stranger, order.id).await,
            Err(OrderError::NotFound(_))
        ));
        assert!(matches!(
            s.orders.cancel_for_user(stranger, order.id, None).await,
            Err(OrderError::NotFound(_))
        ));
        assert!(s.orders.orders_for_user(stranger).await.unwrap().is_empty());
        assert_eq!(s.orders.orders_for_user(owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_advances_until_delivered() {
        let s = shop();
        let user = UserId::new();
        s.cart.add_item(user, s.chess.id, 1).await.unwrap();
        let order = s.orders.checkout(user, fixtures::shipping_data(), None).await.unwrap();

        for expected in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            assert_eq!(s.orders.advance_status(order.id).await.unwrap().status, expected);
        }
        assert!(matches!(
            s.orders.advance_status(order.id).await,
            Err(OrderError::InvalidTransition { from: OrderStatus::Delivered, .. })
        ));
        assert!(matches!(
            s.orders.cancel(order.id, None).await,
            Err(OrderError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn skipping_a_step_is_rejected() {
        let s = shop();
        let user = UserId::new();
        s.cart.add_item(user, s.chess.id, 1).await.unwrap();
        let order = s.orders.checkout(user, fixtures::shipping_data(), None).await.unwrap();

        assert!(matches!(
            s.orders.update_status(order.id, OrderStatus::Shipped).await,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped
            })
        ));
    }

    #[tokio::test]
    async fn cancelled_status_goes_through_cancellation() {
        let s = shop();
        let user = UserId::new();
        s.cart.add_item(user, s.go.id, 2).await.unwrap();
        let order = s.orders.checkout(user, fixtures::shipping_data(), None).await.unwrap();

        s.orders.update_status(order.id, OrderStatus::Cancelled).await.unwrap();

        assert_eq!(s.h.store.stock_of(s.go.id), Some(3));
        assert_eq!(s.h.events.event_types().last(), Some(&"OrderCancelled.v1"));
    }

    #[tokio::test]
    async fn refunds_require_payment() {
        let s = shop();
        let user = UserId::new();
        s.cart.add_item(user, s.chess.id, 1).await.unwrap();
        let order = s.orders.checkout(user, fixtures::shipping_data(), None).await.unwrap();

        assert!(matches!(
            s.orders.set_payment_status(order.id, PaymentStatus::Refunded).await,
            Err(OrderError::InvalidPaymentTransition { .. })
        ));
        s.orders.set_payment_status(order.id, PaymentStatus::Paid).await.unwrap();
        let refunded = s
            .orders
            .set_payment_status(order.id, PaymentStatus::Refunded)
            .await
            .unwrap();
        assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let s = shop();
        assert!(matches!(
            s.orders.cancel(OrderId::new(), None).await,
            Err(OrderError::NotFound(_))
        ));
    }
}
