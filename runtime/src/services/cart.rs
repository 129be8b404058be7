//! Cart service.

use crate::Environment;
use crate::metrics::CartMetrics;
use storefront_core::cache::CacheTag;
use storefront_core::cart::{CartError, CartItem, CartSummary, Unavailability, check_add, check_set};
use storefront_core::event::DomainEvent;
use storefront_core::{CartItemId, ProductId, UserId};

/// Cache key of a user's cart count.
#[must_use]
pub fn cart_count_key(user_id: UserId) -> String {
    format!("cart:count:{user_id}")
}

/// Adds, updates and removes cart lines.
#[derive(Clone)]
pub struct CartService {
    env: Environment,
}

impl CartService {
    /// Create the service.
    #[must_use]
    pub const fn new(env: Environment) -> Self {
        Self { env }
    }

    /// Add `quantity` units of a product, accumulating onto an existing line.
    ///
    /// # Errors
    ///
    /// - `ProductNotFound` for an unknown product
    /// - `ProductNotAvailable` when inactive, out of stock, or the line would exceed stock
    /// - `InvalidQuantity` outside `1..=99`, or when the line would exceed 99
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartItem, CartError> {
        let store = &self.env.store;
        let product = store
            .product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;
        let existing = store.cart_quantity(user_id, product_id).await?;
        let total = check_add(&product, existing, quantity)?;

        let now = self.env.clock.now();
        let Some(item) = store.add_to_cart(user_id, product_id, quantity, now).await? else {
            // Stock or status changed between the check and the write.
            return Err(self.fresh_add_error(user_id, product_id, quantity, total).await);
        };

        self.env.cache.forget(&cart_count_key(user_id)).await;
        CartMetrics::record_added(quantity);
        tracing::debug!(%user_id, %product_id, quantity, line_quantity = item.quantity, "Cart item added");
        self.env.events.publish(DomainEvent::CartItemAdded {
            user_id,
            item_id: item.id,
            product_id,
            quantity,
            line_quantity: item.quantity,
            at: now,
        });
        Ok(item)
    }

    async fn fresh_add_error(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
        total: u32,
    ) -> CartError {
        let store = &self.env.store;
        let product = match store.product(product_id).await {
            Ok(Some(product)) => product,
            Ok(None) => return CartError::ProductNotFound(product_id),
            Err(e) => return e.into(),
        };
        let existing = match store.cart_quantity(user_id, product_id).await {
            Ok(existing) => existing,
            Err(e) => return e.into(),
        };
        check_add(&product, existing, quantity).err().unwrap_or(
            CartError::ProductNotAvailable {
                product_id,
                reason: Unavailability::InsufficientStock {
                    available: product.stock_quantity,
                    requested: total,
                },
            },
        )
    }

    /// Replace the quantity of one of the user's lines.
    ///
    /// # Errors
    ///
    /// `ItemNotFound` when the line is not in this user's cart, otherwise the
    /// same errors as [`CartService::add_item`] for the new absolute quantity.
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem, CartError> {
        let store = &self.env.store;
        let line = store
            .cart_line(user_id, item_id)
            .await?
            .ok_or(CartError::ItemNotFound(item_id))?;
        check_set(&line.product, quantity)?;

        let now = self.env.clock.now();
        let Some(item) = store.set_cart_quantity(user_id, item_id, quantity, now).await? else {
            let product = store
                .product(line.product.id)
                .await?
                .ok_or(CartError::ProductNotFound(line.product.id))?;
            return Err(check_set(&product, quantity).err().unwrap_or(
                CartError::ItemNotFound(item_id),
            ));
        };

        self.env.cache.forget(&cart_count_key(user_id)).await;
        tracing::debug!(%user_id, %item_id, old = line.item.quantity, new = quantity, "Cart item updated");
        self.env.events.publish(DomainEvent::CartItemUpdated {
            user_id,
            item_id,
            product_id: item.product_id,
            old_quantity: line.item.quantity,
            new_quantity: item.quantity,
            at: now,
        });
        Ok(item)
    }

    /// Remove one of the user's lines.
    ///
    /// # Errors
    ///
    /// `ItemNotFound` when the line is not in this user's cart.
    pub async fn remove_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<CartItem, CartError> {
        let item = self
            .env
            .store
            .remove_cart_item(user_id, item_id)
            .await?
            .ok_or(CartError::ItemNotFound(item_id))?;

        self.env.cache.forget(&cart_count_key(user_id)).await;
        tracing::debug!(%user_id, %item_id, "Cart item removed");
        self.env.events.publish(DomainEvent::CartItemRemoved {
            user_id,
            item_id,
            product_id: item.product_id,
            quantity: item.quantity,
            at: self.env.clock.now(),
        });
        Ok(item)
    }

    /// Remove every line, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, CartError> {
        let removed = self.env.store.clear_cart(user_id).await?;

        self.env.cache.forget(&cart_count_key(user_id)).await;
        tracing::debug!(%user_id, removed, "Cart cleared");
        self.env.events.publish(DomainEvent::CartCleared {
            user_id,
            removed,
            at: self.env.clock.now(),
        });
        Ok(removed)
    }

    /// Priced view of the cart.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn summary(&self, user_id: UserId) -> Result<CartSummary, CartError> {
        let lines = self.env.store.cart_lines(user_id).await?;
        Ok(CartSummary::from_lines(&lines))
    }

    /// Units in the cart. Cached per user until the next cart mutation.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn count(&self, user_id: UserId) -> Result<u32, CartError> {
        let store = &self.env.store;
        self.env
            .cache
            .remember(
                &cart_count_key(user_id),
                self.env.settings.cart_count_ttl(),
                &[CacheTag::Cart],
                || async move { Ok(store.cart_count(user_id).await?) },
            )
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use storefront_core::catalog::Product;
    use storefront_testing::fixtures;

    fn harness_with_product(stock: u32) -> (Harness, Product) {
        let h = Harness::new();
        let category = h.store.insert_category(fixtures::category("Games"));
        let product = h
            .store
            .insert_product(fixtures::product(category.id, "Chess", 10_000, stock));
        (h, product)
    }

    #[tokio::test]
    async fn repeated_adds_accumulate_without_touching_stock() {
        let (h, product) = harness_with_product(10);
        let cart = CartService::new(h.env());
        let user = UserId::new();

        cart.add_item(user, product.id, 2).await.unwrap();
        assert_eq!(cart.count(user).await.unwrap(), 2);
        let item = cart.add_item(user, product.id, 3).await.unwrap();

        assert_eq!(item.quantity, 5);
        assert_eq!(cart.count(user).await.unwrap(), 5);
        assert_eq!(h.store.stock_of(product.id), Some(10));
        assert_eq!(h.events.event_types(), ["CartItemAdded.v1", "CartItemAdded.v1"]);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let h = Harness::new();
        let cart = CartService::new(h.env());
        let missing = ProductId::new();
        assert!(matches!(
            cart.add_item(UserId::new(), missing, 1).await,
            Err(CartError::ProductNotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn rejected_add_leaves_cart_untouched() {
        let (h, product) = harness_with_product(4);
        let cart = CartService::new(h.env());
        let user = UserId::new();
        cart.add_item(user, product.id, 3).await.unwrap();

        let err = cart.add_item(user, product.id, 2).await.unwrap_err();

        assert!(matches!(err, CartError::ProductNotAvailable { .. }));
        assert_eq!(cart.count(user).await.unwrap(), 3);
        assert_eq!(h.events.events().len(), 1);
    }

    #[tokio::test]
    async fn update_replaces_quantity_and_checks_stock() {
        let (h, product) = harness_with_product(6);
        let cart = CartService::new(h.env());
        let user = UserId::new();
        let item = cart.add_item(user, product.id, 1).await.unwrap();

        let updated = cart.update_quantity(user, item.id, 6).await.unwrap();
        assert_eq!(updated.quantity, 6);
        assert!(matches!(
            cart.update_quantity(user, item.id, 7).await,
            Err(CartError::ProductNotAvailable { .. })
        ));
        assert!(matches!(
            cart.update_quantity(user, item.id, 0).await,
            Err(CartError::InvalidQuantity { quantity: 0 })
        ));
    }

    #[tokio::test]
    async fn lines_of_other_users_are_invisible() {
        let (h, product) = harness_with_product(6);
        let cart = CartService::new(h.env());
        let owner = UserId::new();
        let item = cart.add_item(owner, product.id, 1).await.unwrap();

        let stranger = UserId::new();
        assert!(matches!(
            cart.update_quantity(stranger, item.id, 2).await,
            Err(CartError::ItemNotFound(_))
        ));
        assert!(matches!(
            cart.remove_item(stranger, item.id).await,
            Err(CartError::ItemNotFound(_))
        ));
    }

    #[tokio::test]
    async fn clear_reports_removed_lines_and_resets_count() {
        let (h, product) = harness_with_product(6);
        let other = h.store.insert_product(fixtures::product(product.category_id, "Go", 5_000, 3));
        let cart = CartService::new(h.env());
        let user = UserId::new();
        cart.add_item(user, product.id, 1).await.unwrap();
        cart.add_item(user, other.id, 2).await.unwrap();
        assert_eq!(cart.count(user).await.unwrap(), 3);

        assert_eq!(cart.clear(user).await.unwrap(), 2);
        assert_eq!(cart.count(user).await.unwrap(), 0);
        assert!(matches!(
            h.events.events().last(),
            Some(DomainEvent::CartCleared { removed: 2, .. })
        ));
    }

    #[tokio::test]
    async fn summary_uses_effective_prices() {
        let (h, product) = harness_with_product(6);
        h.store.update_product(product.id, |p| {
            p.promotional_price = Some(storefront_core::Money::from_cents(8_000));
        });
        let cart = CartService::new(h.env());
        let user = UserId::new();
        cart.add_item(user, product.id, 2).await.unwrap();

        let summary = cart.summary(user).await.unwrap();
        assert_eq!(summary.subtotal.cents(), 16_000);
        assert_eq!(summary.item_count, 2);
    }

    #[tokio::test]
    async fn concurrent_adds_never_exceed_stock() {
        let (h, product) = harness_with_product(10);
        let cart = CartService::new(h.env());
        let user = UserId::new();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cart = cart.clone();
            tasks.push(tokio::spawn(async move { cart.add_item(user, product.id, 3).await }));
        }
        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 3);
        assert_eq!(cart.count(user).await.unwrap(), 9);
    }
}
