//! Tests for the in-memory storefront and the recording doubles.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use chrono::Duration;
use std::time::Duration as StdDuration;
use storefront_core::cache::{CacheBackend, CacheError};
use storefront_core::catalog::Product;
use storefront_core::checkout::{ShippingRates, plan};
use storefront_core::environment::Clock;
use storefront_core::event::{DomainEvent, EventPublisher};
use storefront_core::order::{Order, OrderStatus, PaymentStatus};
use storefront_core::store::{
    CartStore, CatalogStore, CouponStore, OrderStore, StoreError, WishlistStore,
};
use storefront_core::UserId;
use storefront_testing::{
    FailingCache, FixedClock, InMemoryStorefront, RecordingPublisher, fixtures, test_clock,
};

fn seeded(stock: u32) -> (InMemoryStorefront, Product) {
    let store = InMemoryStorefront::new();
    let category = store.insert_category(fixtures::category("Games"));
    let product = store.insert_product(fixtures::product(category.id, "Chess Set", 8_900, stock));
    (store, product)
}

async fn order_for(
    store: &InMemoryStorefront,
    clock: &FixedClock,
    product: &Product,
    quantity: u32,
) -> Order {
    let user = UserId::new();
    store
        .add_to_cart(user, product.id, quantity, clock.now())
        .await
        .unwrap()
        .expect("add accepted");
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
    store.place_order(draft).await.unwrap()
}

#[tokio::test]
async fn placing_an_order_takes_stock_and_empties_the_cart() {
    let (store, product) = seeded(10);
    let clock = test_clock();

    let order = order_for(&store, &clock, &product, 3).await;

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.items.len(), 1);
    assert_eq!(store.stock_of(product.id), Some(7));
    assert_eq!(store.cart_count(order.user_id).await.unwrap(), 0);
    assert_eq!(store.order_item_count(), 1);
}

#[tokio::test]
async fn cancelling_restores_stock_exactly_once() {
    let (store, product) = seeded(10);
    let clock = test_clock();
    let order = order_for(&store, &clock, &product, 4).await;

    let cancelled = store
        .cancel_order(order.id, Some("changed my mind".to_string()), clock.now())
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("changed my mind"));
    assert_eq!(store.stock_of(product.id), Some(10));

    let again = store.cancel_order(order.id, None, clock.now()).await;
    assert!(matches!(
        again,
        Err(StoreError::InvalidTransition {
            from: OrderStatus::Cancelled,
            to: OrderStatus::Cancelled
        })
    ));
    assert_eq!(store.stock_of(product.id), Some(10));
}

#[tokio::test]
async fn status_moves_one_step_at_a_time() {
    let (store, product) = seeded(10);
    let clock = test_clock();
    let order = order_for(&store, &clock, &product, 1).await;

    let skipped = store
        .update_order_status(order.id, OrderStatus::Shipped, clock.now())
        .await;
    assert!(matches!(skipped, Err(StoreError::InvalidTransition { .. })));

    for step in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
    ] {
        clock.advance(Duration::minutes(5));
        let updated = store
            .update_order_status(order.id, step, clock.now())
            .await
            .unwrap();
        assert_eq!(updated.status, step);
        assert_eq!(updated.updated_at, clock.now());
    }

    // Shipped orders can no longer be cancelled
    let cancel = store.cancel_order(order.id, None, clock.now()).await;
    assert!(matches!(cancel, Err(StoreError::InvalidTransition { .. })));
    assert_eq!(store.stock_of(product.id), Some(9));
}

#[tokio::test]
async fn refunded_payments_are_final() {
    let (store, product) = seeded(10);
    let clock = test_clock();
    let order = order_for(&store, &clock, &product, 1).await;

    let refund_unpaid = store
        .update_payment_status(order.id, PaymentStatus::Refunded, clock.now())
        .await;
    assert!(matches!(
        refund_unpaid,
        Err(StoreError::InvalidPaymentTransition { .. })
    ));

    store
        .update_payment_status(order.id, PaymentStatus::Paid, clock.now())
        .await
        .unwrap();
    store
        .update_payment_status(order.id, PaymentStatus::Refunded, clock.now())
        .await
        .unwrap();
    let after = store
        .update_payment_status(order.id, PaymentStatus::Paid, clock.now())
        .await;
    assert!(matches!(
        after,
        Err(StoreError::InvalidPaymentTransition { .. })
    ));
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let (store, _) = seeded(1);
    let clock = test_clock();
    let missing = storefront_core::OrderId::new();

    assert!(store.order(missing).await.unwrap().is_none());
    assert!(matches!(
        store.cancel_order(missing, None, clock.now()).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn wishlist_pairs_are_unique() {
    let (store, product) = seeded(1);
    let clock = test_clock();
    let user = UserId::new();

    assert!(store.add_to_wishlist(user, product.id, clock.now()).await.unwrap());
    assert!(!store.add_to_wishlist(user, product.id, clock.now()).await.unwrap());
    assert!(store.wishlist_contains(user, product.id).await.unwrap());
    assert_eq!(store.wishlist(user).await.unwrap().len(), 1);

    assert!(store.remove_from_wishlist(user, product.id).await.unwrap());
    assert!(!store.remove_from_wishlist(user, product.id).await.unwrap());
    assert!(store.wishlist(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn coupon_lookup_ignores_case_and_whitespace() {
    let store = InMemoryStorefront::new();
    store.insert_coupon(fixtures::desconto10());

    let coupon = store.coupon("  desconto10 ").await.unwrap().unwrap();
    assert_eq!(coupon.percent_bps, 1_000);
    assert!(store.coupon("DESCONTO20").await.unwrap().is_none());
}

#[tokio::test]
async fn set_stock_on_unknown_product_is_none() {
    let store = InMemoryStorefront::new();
    let clock = test_clock();

    let result = store
        .set_stock(storefront_core::ProductId::new(), 5, clock.now())
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn failing_cache_counts_every_call() {
    let cache = FailingCache::new();

    assert!(matches!(
        cache.get("dashboard:counts").await,
        Err(CacheError::Backend(_))
    ));
    assert!(
        cache
            .put("dashboard:counts", vec![1], StdDuration::from_secs(60), &[])
            .await
            .is_err()
    );
    assert!(cache.forget("dashboard:counts").await.is_err());
    assert!(cache.flush_tags(&[]).await.is_err());
    assert_eq!(cache.calls(), 4);
}

#[test]
fn recording_publisher_keeps_event_order() {
    let publisher = RecordingPublisher::new();
    let clock = test_clock();
    let user_id = UserId::new();

    publisher.publish(DomainEvent::CartCleared {
        user_id,
        removed: 2,
        at: clock.now(),
    });
    publisher.publish(DomainEvent::CartCleared {
        user_id,
        removed: 0,
        at: clock.now(),
    });

    assert_eq!(
        publisher.event_types(),
        vec!["CartCleared.v1", "CartCleared.v1"]
    );
    assert!(matches!(
        publisher.events().first(),
        Some(DomainEvent::CartCleared { removed: 2, .. })
    ));
}
