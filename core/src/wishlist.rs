//! Wishlist membership.

use crate::ids::ProductId;
use crate::store::StoreError;
use thiserror::Error;

/// Wishlist operation failures.
#[derive(Error, Debug)]
pub enum WishlistError {
    /// No such product
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}
