//! Cache backend abstraction and the tag taxonomy.
//!
//! Tags form a small hierarchy. An entry stored under `cart` is also stored
//! under `user_data` and `dynamic`, so flushing `dynamic` evicts it too.
//!
//! | Tag         | Implies                 |
//! |-------------|-------------------------|
//! | `cart`      | `user_data`, `dynamic`  |
//! | `user`      | `user_data`             |
//! | `session`   | `user_data`, `dynamic`  |
//! | `product`   | `catalog`               |
//! | `category`  | `catalog`               |
//! | `promotion` | `catalog`, `dynamic`    |
//! | `order`     | `dynamic`               |
//! | `dashboard` | `dynamic`               |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Boxed future returned by cache backends.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// Label used for bulk invalidation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTag {
    /// Cart contents and counts
    Cart,
    /// User profile data
    User,
    /// Session-scoped data
    Session,
    /// Product reads
    Product,
    /// Category reads
    Category,
    /// Promotional listings
    Promotion,
    /// Order reads
    Order,
    /// Admin dashboard aggregates
    Dashboard,
    /// Parent of everything tied to one user
    UserData,
    /// Parent of catalog reads
    Catalog,
    /// Parent of fast-changing data
    Dynamic,
}

impl CacheTag {
    /// Name used in backend keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::User => "user",
            Self::Session => "session",
            Self::Product => "product",
            Self::Category => "category",
            Self::Promotion => "promotion",
            Self::Order => "order",
            Self::Dashboard => "dashboard",
            Self::UserData => "user_data",
            Self::Catalog => "catalog",
            Self::Dynamic => "dynamic",
        }
    }

    /// Tags implied by this one.
    #[must_use]
    pub const fn ancestors(self) -> &'static [Self] {
        match self {
            Self::Cart | Self::Session => &[Self::UserData, Self::Dynamic],
            Self::User => &[Self::UserData],
            Self::Product | Self::Category => &[Self::Catalog],
            Self::Promotion => &[Self::Catalog, Self::Dynamic],
            Self::Order | Self::Dashboard => &[Self::Dynamic],
            Self::UserData | Self::Catalog | Self::Dynamic => &[],
        }
    }

    /// `tags` plus all their ancestors, sorted and without duplicates.
    #[must_use]
    pub fn expand(tags: &[Self]) -> Vec<Self> {
        let mut out: Vec<Self> = tags
            .iter()
            .flat_map(|tag| std::iter::once(*tag).chain(tag.ancestors().iter().copied()))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache backend failures. Callers degrade to computing values directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Backend unreachable or command failed
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Stored value could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Key-value store with TTLs and tag sets.
///
/// Implementations store tags exactly as given; expansion to ancestors happens
/// before `put` is called.
pub trait CacheBackend: Send + Sync {
    /// Read a live entry.
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Vec<u8>>>;

    /// Store an entry for `ttl`, registering it under every tag.
    fn put<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
        ttl: Duration,
        tags: &'a [CacheTag],
    ) -> CacheFuture<'a, ()>;

    /// Remove one entry. `true` when something was removed.
    fn forget<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool>;

    /// Remove every entry registered under any of `tags`, returning how many.
    fn flush_tags<'a>(&'a self, tags: &'a [CacheTag]) -> CacheFuture<'a, u64>;
}
