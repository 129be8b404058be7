//! Tag-aware caching over any [`CacheBackend`].
//!
//! [`CacheService`] is the only way services touch the cache. It expands tags
//! to their ancestors before storing, encodes values with `bincode`, and turns
//! every backend failure into a warning plus a direct computation: the cache
//! can make a request faster but never makes it fail.

use crate::metrics::CacheMetrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::cache::{CacheBackend, CacheError, CacheFuture, CacheTag};
use storefront_core::environment::Clock;
use tokio::sync::RwLock;

/// Cache front used by the services.
#[derive(Clone)]
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
}

impl CacheService {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Return the cached value for `key`, or compute, store and return it.
    ///
    /// `tags` are expanded to their ancestors before storing. Backend errors
    /// and undecodable entries are logged and the value is computed directly.
    ///
    /// # Errors
    ///
    /// Only errors returned by `compute`.
    pub async fn remember<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        tags: &[CacheTag],
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.backend.get(key).await {
            Ok(Some(bytes)) => match bincode::deserialize::<T>(&bytes) {
                Ok(value) => {
                    CacheMetrics::record_hit();
                    tracing::trace!(key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    CacheMetrics::record_error("decode");
                    tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                }
            },
            Ok(None) => {
                CacheMetrics::record_miss();
                tracing::trace!(key, "Cache miss");
            }
            Err(e) => {
                CacheMetrics::record_error("get");
                tracing::warn!(key, error = %e, "Cache read failed, computing directly");
                return compute().await;
            }
        }

        let value = compute().await?;
        self.store(key, &value, ttl, tags).await;
        Ok(value)
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T, ttl: Duration, tags: &[CacheTag]) {
        let bytes = match bincode::serialize(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                CacheMetrics::record_error("encode");
                tracing::warn!(key, error = %e, "Failed to encode cache entry");
                return;
            }
        };
        let tags = CacheTag::expand(tags);
        if let Err(e) = self.backend.put(key, bytes, ttl, &tags).await {
            CacheMetrics::record_error("put");
            tracing::warn!(key, error = %e, "Cache write failed");
        }
    }

    /// Drop one entry.
    pub async fn forget(&self, key: &str) {
        if let Err(e) = self.backend.forget(key).await {
            CacheMetrics::record_error("forget");
            tracing::warn!(key, error = %e, "Cache eviction failed");
        }
    }

    /// Drop every entry stored under any of `tags`, returning how many went.
    ///
    /// Returns zero when the backend is unavailable.
    pub async fn flush(&self, tags: &[CacheTag]) -> u64 {
        match self.backend.flush_tags(tags).await {
            Ok(removed) => {
                tracing::debug!(?tags, removed, "Cache tags flushed");
                removed
            }
            Err(e) => {
                CacheMetrics::record_error("flush");
                tracing::warn!(?tags, error = %e, "Cache tag flush failed");
                0
            }
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// Minimum clock time between two sweeps of expired entries.
const SWEEP_INTERVAL_SECS: i64 = 60;

#[derive(Debug, Default)]
struct Entries {
    values: HashMap<String, Entry>,
    tags: HashMap<CacheTag, HashSet<String>>,
    next_sweep: Option<DateTime<Utc>>,
}

impl Entries {
    /// Drop every entry expired at `now`, returning how many went.
    fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .values
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        self.next_sweep = Some(now + chrono::Duration::seconds(SWEEP_INTERVAL_SECS));
        expired.len()
    }

    fn remove(&mut self, key: &str) -> bool {
        for keys in self.tags.values_mut() {
            keys.remove(key);
        }
        self.values.remove(key).is_some()
    }
}

/// In-process cache backend.
///
/// TTLs are checked against the injected clock on read. Expired entries are
/// dropped when read, and writes sweep the whole map at most once a minute so
/// keys that are never read again do not accumulate.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<RwLock<Entries>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Entries::default())),
            clock,
        }
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.values.len()
    }

    /// True when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CacheBackend for MemoryCache {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let now = self.clock.now();
            {
                let entries = self.entries.read().await;
                match entries.values.get(key) {
                    Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                    None => return Ok(None),
                    Some(_) => {}
                }
            }
            // Expired: remove under the write lock
            let mut entries = self.entries.write().await;
            if entries.values.get(key).is_some_and(|e| e.expires_at <= now) {
                entries.remove(key);
            }
            Ok(None)
        })
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
        ttl: Duration,
        tags: &'a [CacheTag],
    ) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            let ttl = chrono::Duration::from_std(ttl)
                .map_err(|e| CacheError::Backend(format!("invalid ttl: {e}")))?;
            let now = self.clock.now();
            let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

            let mut entries = self.entries.write().await;
            if entries.next_sweep.is_none_or(|at| now >= at) {
                let swept = entries.sweep(now);
                if swept > 0 {
                    tracing::debug!(swept, "Expired cache entries swept");
                }
            }
            entries.remove(key);
            entries
                .values
                .insert(key.to_string(), Entry { value, expires_at });
            for tag in tags {
                entries.tags.entry(*tag).or_default().insert(key.to_string());
            }
            Ok(())
        })
    }

    fn forget<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool> {
        Box::pin(async move { Ok(self.entries.write().await.remove(key)) })
    }

    fn flush_tags<'a>(&'a self, tags: &'a [CacheTag]) -> CacheFuture<'a, u64> {
        Box::pin(async move {
            let mut entries = self.entries.write().await;
            let mut removed = 0;
            for tag in tags {
                let Some(keys) = entries.tags.remove(tag) else {
                    continue;
                };
                for key in keys {
                    if entries.remove(&key) {
                        removed += 1;
                    }
                }
            }
            Ok(removed)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicU32, Ordering};
    use storefront_testing::{FailingCache, test_clock};

    fn service() -> (CacheService, MemoryCache, storefront_testing::FixedClock) {
        let clock = test_clock();
        let memory = MemoryCache::new(Arc::new(clock.clone()));
        (CacheService::new(Arc::new(memory.clone())), memory, clock)
    }

    async fn counted(cache: &CacheService, calls: &AtomicU32, key: &str, tags: &[CacheTag]) -> u32 {
        cache
            .remember(key, Duration::from_secs(60), tags, || async {
                Ok::<_, Infallible>(calls.fetch_add(1, Ordering::SeqCst) + 1)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn remember_computes_once_until_expiry() {
        let (cache, _, clock) = service();
        let calls = AtomicU32::new(0);

        assert_eq!(counted(&cache, &calls, "k", &[]).await, 1);
        assert_eq!(counted(&cache, &calls, "k", &[]).await, 1);

        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(counted(&cache, &calls, "k", &[]).await, 2);
    }

    #[tokio::test]
    async fn flushing_a_parent_tag_evicts_children() {
        let (cache, memory, _) = service();
        let calls = AtomicU32::new(0);
        counted(&cache, &calls, "cart:count:1", &[CacheTag::Cart]).await;
        counted(&cache, &calls, "catalog:products", &[CacheTag::Product]).await;

        assert_eq!(cache.flush(&[CacheTag::Dynamic]).await, 1);
        assert_eq!(memory.len().await, 1);

        assert_eq!(cache.flush(&[CacheTag::Catalog]).await, 1);
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn forget_drops_a_single_key() {
        let (cache, _, _) = service();
        let calls = AtomicU32::new(0);
        counted(&cache, &calls, "a", &[]).await;
        cache.forget("a").await;
        assert_eq!(counted(&cache, &calls, "a", &[]).await, 2);
    }

    #[tokio::test]
    async fn backend_failure_falls_back_to_compute() {
        let failing = FailingCache::new();
        let cache = CacheService::new(Arc::new(failing.clone()));
        let calls = AtomicU32::new(0);

        assert_eq!(counted(&cache, &calls, "k", &[CacheTag::Dashboard]).await, 1);
        assert_eq!(counted(&cache, &calls, "k", &[CacheTag::Dashboard]).await, 2);
        assert_eq!(cache.flush(&[CacheTag::Dashboard]).await, 0);
        assert!(failing.calls() >= 3);
    }

    #[tokio::test]
    async fn compute_errors_are_not_cached() {
        let (cache, memory, _) = service();
        let result: Result<u32, &str> = cache
            .remember("k", Duration::from_secs(60), &[], || async { Err("boom") })
            .await;
        assert_eq!(result, Err("boom"));
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn undecodable_entries_are_recomputed() {
        let (cache, memory, _) = service();
        memory
            .put("k", vec![1], Duration::from_secs(60), &[])
            .await
            .unwrap();
        let value: String = cache
            .remember("k", Duration::from_secs(60), &[], || async {
                Ok::<_, Infallible>("fresh".to_string())
            })
            .await
            .unwrap();
        assert_eq!(value, "fresh");
    }

    #[tokio::test]
    async fn expired_keys_are_reclaimed_by_later_writes() {
        let (cache, memory, clock) = service();
        let calls = AtomicU32::new(0);
        for i in 0..1_000 {
            counted(&cache, &calls, &format!("catalog:products:search={i}"), &[CacheTag::Product])
                .await;
        }
        assert_eq!(memory.len().await, 1_000);

        clock.advance(chrono::Duration::days(1));
        counted(&cache, &calls, "catalog:products:search=fresh", &[CacheTag::Product]).await;

        assert_eq!(memory.len().await, 1);
        // Tag sets no longer reference the swept keys
        assert_eq!(cache.flush(&[CacheTag::Catalog]).await, 1);
    }

    #[tokio::test]
    async fn sweeps_run_at_most_once_a_minute() {
        let (_, memory, clock) = service();
        let short = Duration::from_secs(1);

        memory.put("a", vec![1], short, &[]).await.unwrap();
        clock.advance(chrono::Duration::seconds(2));
        memory.put("b", vec![1], short, &[]).await.unwrap();
        assert_eq!(memory.len().await, 2);

        clock.advance(chrono::Duration::seconds(60));
        memory.put("c", vec![1], short, &[]).await.unwrap();
        assert_eq!(memory.len().await, 1);
    }
}
