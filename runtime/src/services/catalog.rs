//! Catalog browsing and stock administration.

use crate::Environment;
use storefront_core::ProductId;
use storefront_core::cache::CacheTag;
use storefront_core::catalog::{CatalogError, CategorySummary, Product, ProductFilter};

/// Cached catalog reads plus the admin mutations that invalidate them.
#[derive(Clone)]
pub struct CatalogService {
    env: Environment,
}

impl CatalogService {
    /// Create the service.
    #[must_use]
    pub const fn new(env: Environment) -> Self {
        Self { env }
    }

    /// Products matching `filter`, cached per filter.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>, CatalogError> {
        let mut tags = vec![CacheTag::Product, CacheTag::Category];
        if filter.on_sale {
            tags.push(CacheTag::Promotion);
        }
        let store = &self.env.store;
        self.env
            .cache
            .remember(
                &format!("catalog:products:{}", filter.cache_key()),
                self.env.settings.catalog_ttl(),
                &tags,
                || async move { store.products(filter).await.map_err(CatalogError::Store) },
            )
            .await
    }

    /// One active product.
    ///
    /// # Errors
    ///
    /// `ProductNotFound` for unknown or inactive products.
    pub async fn product(&self, id: ProductId) -> Result<Product, CatalogError> {
        let store = &self.env.store;
        let product: Option<Product> = self
            .env
            .cache
            .remember(
                &format!("catalog:product:{id}"),
                self.env.settings.catalog_ttl(),
                &[CacheTag::Product],
                || async move { store.product(id).await.map_err(CatalogError::Store) },
            )
            .await?;
        product
            .filter(|p| p.active)
            .ok_or(CatalogError::ProductNotFound(id))
    }

    /// Active categories with their product counts.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn categories(&self) -> Result<Vec<CategorySummary>, CatalogError> {
        let store = &self.env.store;
        self.env
            .cache
            .remember(
                "catalog:categories",
                self.env.settings.catalog_ttl(),
                &[CacheTag::Category, CacheTag::Product],
                || async move { store.categories().await.map_err(CatalogError::Store) },
            )
            .await
    }

    /// Overwrite a product's stock.
    ///
    /// # Errors
    ///
    /// `ProductNotFound` for an unknown id.
    pub async fn set_stock(&self, id: ProductId, quantity: u32) -> Result<Product, CatalogError> {
        let product = self
            .env
            .store
            .set_stock(id, quantity, self.env.clock.now())
            .await
            .map_err(|e| CatalogError::from_store(id, e))?
            .ok_or(CatalogError::ProductNotFound(id))?;

        self.env.cache.flush(&[CacheTag::Product]).await;
        tracing::info!(product_id = %id, quantity, "Stock updated");
        Ok(product)
    }

    /// Delete a product nobody has ordered.
    ///
    /// # Errors
    ///
    /// `ProductNotFound` for an unknown id, `ProductReferenced` when an order
    /// line points at it.
    pub async fn delete_product(&self, id: ProductId) -> Result<(), CatalogError> {
        self.env
            .store
            .delete_product(id)
            .await
            .map_err(|e| CatalogError::from_store(id, e))?;

        self.env.cache.flush(&[CacheTag::Product]).await;
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }
}
