//! Redis cache backend.
//!
//! # Architecture
//!
//! Entries are stored in Redis with:
//! - **Value key**: `{prefix}:cache:{key}` → encoded value, `SET ... EX ttl`
//! - **Tag index**: `{prefix}:cache-tag:{tag}` (Set) → keys registered under the tag
//!
//! Flushing a tag reads its set, deletes every member and then the set itself.
//! Members whose value already expired are simply missing from the count.
//!
//! # Example
//!
//! ```no_run
//! use storefront_redis::RedisCache;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = RedisCache::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::BTreeSet;
use std::time::Duration;
use storefront_core::cache::{CacheBackend, CacheError, CacheFuture, CacheTag};

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "storefront";

/// Extra lifetime given to tag sets beyond the entry TTL.
const TAG_SET_BUFFER_SECS: u64 = 86_400;

fn backend_err(e: redis::RedisError) -> CacheError {
    tracing::warn!(error = %e, "Redis command failed");
    CacheError::Backend(e.to_string())
}

/// [`CacheBackend`] backed by Redis through a `ConnectionManager`.
///
/// Cloning is cheap; clones share the managed connection.
#[derive(Clone)]
pub struct RedisCache {
    conn_manager: ConnectionManager,
    prefix: String,
}

impl RedisCache {
    /// Connect using [`DEFAULT_PREFIX`].
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or Redis cannot be reached.
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        Self::with_prefix(redis_url, DEFAULT_PREFIX).await
    }

    /// Connect with a key prefix, so several deployments can share one Redis.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or Redis cannot be reached.
    pub async fn with_prefix(redis_url: &str, prefix: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheError::Backend(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::Backend(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!(prefix, "Connected Redis cache");
        Ok(Self {
            conn_manager,
            prefix: prefix.to_string(),
        })
    }

    fn value_key(&self, key: &str) -> String {
        format!("{}:cache:{key}", self.prefix)
    }

    fn tag_key(&self, tag: CacheTag) -> String {
        format!("{}:cache-tag:{}", self.prefix, tag.as_str())
    }
}

impl CacheBackend for RedisCache {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            conn.get(self.value_key(key)).await.map_err(backend_err)
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
            let mut conn = self.conn_manager.clone();
            // EX 0 is rejected by Redis
            let ttl_seconds = ttl.as_secs().max(1);
            let set_ttl_seconds =
                i64::try_from(ttl_seconds + TAG_SET_BUFFER_SECS).unwrap_or(i64::MAX);

            let mut pipe = redis::pipe();
            pipe.atomic().set_ex(self.value_key(key), value, ttl_seconds);
            for tag in tags {
                let tag_key = self.tag_key(*tag);
                pipe.sadd(&tag_key, key)
                    .ignore()
                    .expire(&tag_key, set_ttl_seconds)
                    .ignore();
            }
            let _: () = pipe.query_async(&mut conn).await.map_err(backend_err)?;

            tracing::trace!(key, ttl_seconds, tags = tags.len(), "Stored cache entry");
            Ok(())
        })
    }

    fn forget<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let removed: u64 = conn.del(self.value_key(key)).await.map_err(backend_err)?;
            Ok(removed > 0)
        })
    }

    fn flush_tags<'a>(&'a self, tags: &'a [CacheTag]) -> CacheFuture<'a, u64> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();

            let mut keys = BTreeSet::new();
            let mut tag_keys = Vec::with_capacity(tags.len());
            for tag in tags {
                let tag_key = self.tag_key(*tag);
                let members: Vec<String> = conn.smembers(&tag_key).await.map_err(backend_err)?;
                keys.extend(members.iter().map(|member| self.value_key(member)));
                tag_keys.push(tag_key);
            }

            let removed: u64 = if keys.is_empty() {
                0
            } else {
                conn.del(keys.into_iter().collect::<Vec<_>>())
                    .await
                    .map_err(backend_err)?
            };
            if !tag_keys.is_empty() {
                let _: u64 = conn.del(tag_keys).await.map_err(backend_err)?;
            }

            tracing::debug!(?tags, removed, "Flushed cache tags");
            Ok(removed)
        })
    }
}
