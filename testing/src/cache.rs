//! Cache backend that is always down.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use storefront_core::cache::{CacheBackend, CacheError, CacheFuture, CacheTag};

/// Every call fails with [`CacheError::Backend`].
///
/// Used to check that cache outages degrade to direct computation.
#[derive(Clone, Debug, Default)]
pub struct FailingCache {
    calls: Arc<AtomicU64>,
}

impl FailingCache {
    /// Create a failing cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of backend calls attempted.
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Backend("connection refused".to_string()))
    }
}

impl CacheBackend for FailingCache {
    fn get<'a>(&'a self, _key: &'a str) -> CacheFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move { self.fail() })
    }

    fn put<'a>(
        &'a self,
        _key: &'a str,
        _value: Vec<u8>,
        _ttl: Duration,
        _tags: &'a [CacheTag],
    ) -> CacheFuture<'a, ()> {
        Box::pin(async move { self.fail() })
    }

    fn forget<'a>(&'a self, _key: &'a str) -> CacheFuture<'a, bool> {
        Box::pin(async move { self.fail() })
    }

    fn flush_tags<'a>(&'a self, _tags: &'a [CacheTag]) -> CacheFuture<'a, u64> {
        Box::pin(async move { self.fail() })
    }
}
