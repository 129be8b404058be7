//! Wishlist membership.

use crate::Environment;
use storefront_core::catalog::Product;
use storefront_core::store::StoreError;
use storefront_core::wishlist::WishlistError;
use storefront_core::{ProductId, UserId};

/// Per-user product bookmarks.
#[derive(Clone)]
pub struct WishlistService {
    env: Environment,
}

impl WishlistService {
    /// Create the service.
    #[must_use]
    pub const fn new(env: Environment) -> Self {
        Self { env }
    }

    /// Add the product if absent, remove it if present.
    ///
    /// Returns whether the product is now in the wishlist.
    ///
    /// # Errors
    ///
    /// `ProductNotFound` when adding an unknown product.
    pub async fn toggle(&self, user_id: UserId, product_id: ProductId) -> Result<bool, WishlistError> {
        if self.env.store.remove_from_wishlist(user_id, product_id).await? {
            tracing::debug!(%user_id, %product_id, "Removed from wishlist");
            return Ok(false);
        }
        self.add(user_id, product_id).await?;
        Ok(true)
    }

    /// Add a product. Returns `false` if it was already there.
    ///
    /// # Errors
    ///
    /// `ProductNotFound` for an unknown product.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<bool, WishlistError> {
        let added = self
            .env
            .store
            .add_to_wishlist(user_id, product_id, self.env.clock.now())
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => WishlistError::ProductNotFound(product_id),
                other => other.into(),
            })?;
        if added {
            tracing::debug!(%user_id, %product_id, "Added to wishlist");
        }
        Ok(added)
    }

    /// Remove a product. Returns `false` if it was not there.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<bool, WishlistError> {
        Ok(self.env.store.remove_from_wishlist(user_id, product_id).await?)
    }

    /// Wishlisted products, most recently added first.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Product>, WishlistError> {
        Ok(self.env.store.wishlist(user_id).await?)
    }

    /// Whether the product is wishlisted.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn contains(&self, user_id: UserId, product_id: ProductId) -> Result<bool, WishlistError> {
        Ok(self.env.store.wishlist_contains(user_id, product_id).await?)
    }
}
