//! Cache-aside strategy.

use super::codec;
use super::options::CacheOptions;
use crate::client::KeyValueStore;
use crate::keys::{build_key, namespace_pattern};
use crate::metrics::CacheMetrics;
use linkedall_config::CacheDefaults;
use linkedall_core::CacheResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default TTL for cached values (1 hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Cache-aside reads and explicit invalidation.
///
/// Every operation comes in two forms. The `try_*` methods return the
/// underlying [`CacheError`](linkedall_core::CacheError). The plain
/// methods never fail: errors are logged and counted, then turned into
/// `None`, `false` or `0`, so a cache outage degrades into misses.
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn KeyValueStore>,
    default_ttl: Duration,
}

impl CacheAside {
    /// Creates a strategy with the default one-hour TTL.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            default_ttl: DEFAULT_TTL,
        }
    }

    /// Creates a strategy using configured defaults.
    #[must_use]
    pub fn with_defaults(store: Arc<dyn KeyValueStore>, defaults: &CacheDefaults) -> Self {
        Self {
            store,
            default_ttl: defaults.ttl(),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// TTL applied when the options carry none.
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Reads and decodes a value. A miss is `Ok(None)`.
    pub async fn try_get<T: DeserializeOwned>(&self, key: &str, options: &CacheOptions) -> CacheResult<Option<T>> {
        let full_key = options.full_key(key);
        let value = match self.store.get(&full_key).await? {
            Some(payload) => codec::decode(payload, options.serialize)?,
            None => None,
        };

        if value.is_some() {
            debug!(key = %full_key, "Cache hit");
            CacheMetrics::hit(options.namespace());
        } else {
            debug!(key = %full_key, "Cache miss");
            CacheMetrics::miss(options.namespace());
        }
        Ok(value)
    }

    /// Reads a value, treating every failure as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, options: &CacheOptions) -> Option<T> {
        match self.try_get(key, options).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %options.full_key(key), error = %e, "Cache get failed");
                CacheMetrics::error("get");
                CacheMetrics::miss(options.namespace());
                None
            }
        }
    }

    /// Returns the cached value, or runs `fetcher` once, caches its result,
    /// and returns it.
    ///
    /// Cache failures never surface here; only the fetcher's error does.
    /// Concurrent misses on the same key each run their own fetcher.
    pub async fn get_or_set<T, F, Fut, E>(&self, key: &str, fetcher: F, options: &CacheOptions) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(key, options).await {
            return Ok(cached);
        }

        let value = fetcher().await?;
        self.set(key, &value, options).await;
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Encodes and stores a value with the resolved TTL.
    pub async fn try_set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: &CacheOptions) -> CacheResult<()> {
        let payload = codec::encode(value, options.serialize)?;
        self.store_encoded(key, &payload, options).await
    }

    /// Stores a value. Returns `false` on any failure.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: &CacheOptions) -> bool {
        match self.try_set(key, value, options).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %options.full_key(key), error = %e, "Cache set failed");
                CacheMetrics::error("set");
                false
            }
        }
    }

    /// Stores an already encoded payload.
    pub(crate) async fn store_encoded(&self, key: &str, payload: &str, options: &CacheOptions) -> CacheResult<()> {
        let full_key = options.full_key(key);
        let ttl_secs = options.ttl_secs(self.default_ttl);
        self.store.set_with_expiry(&full_key, payload, ttl_secs).await?;
        debug!(key = %full_key, ttl_secs, "Cached value");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------

    /// Deletes one key and returns how many keys were removed.
    pub async fn try_delete(&self, key: &str, prefix: Option<&str>) -> CacheResult<u64> {
        let full_key = build_key(key, prefix);
        let deleted = self.store.delete(&[full_key.clone()]).await?;
        debug!(key = %full_key, deleted, "Deleted cache key");
        Ok(deleted)
    }

    /// Deletes one key. Returns `true` when the store accepted the command,
    /// whether or not the key existed.
    pub async fn delete(&self, key: &str, prefix: Option<&str>) -> bool {
        match self.try_delete(key, prefix).await {
            Ok(_) => true,
            Err(e) => {
                warn!(key = %build_key(key, prefix), error = %e, "Cache delete failed");
                CacheMetrics::error("delete");
                false
            }
        }
    }

    /// Deletes every key matching a glob pattern.
    pub async fn try_delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let deleted = self.store.delete_by_pattern(pattern).await?;
        debug!(pattern = %pattern, deleted, "Deleted cache keys by pattern");
        Ok(deleted)
    }

    /// Deletes every key matching a glob pattern. Returns 0 on failure.
    pub async fn delete_by_pattern(&self, pattern: &str) -> u64 {
        match self.try_delete_by_pattern(pattern).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Cache pattern delete failed");
                CacheMetrics::error("delete_by_pattern");
                0
            }
        }
    }

    /// Clears every key matching `pattern`.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        self.delete_by_pattern(pattern).await
    }

    /// Fallible form of [`invalidate`](Self::invalidate).
    pub async fn try_invalidate(&self, pattern: &str) -> CacheResult<u64> {
        self.try_delete_by_pattern(pattern).await
    }

    /// Clears a whole namespace (`{prefix}:*`).
    pub async fn invalidate_namespace(&self, prefix: &str) -> u64 {
        self.delete_by_pattern(&namespace_pattern(prefix)).await
    }

    // ------------------------------------------------------------------
    // Presence
    // ------------------------------------------------------------------

    pub async fn try_exists(&self, key: &str, prefix: Option<&str>) -> CacheResult<bool> {
        self.store.exists(&build_key(key, prefix)).await
    }

    /// Checks presence. Returns `false` on failure.
    pub async fn exists(&self, key: &str, prefix: Option<&str>) -> bool {
        match self.try_exists(key, prefix).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(key = %build_key(key, prefix), error = %e, "Cache exists check failed");
                CacheMetrics::error("exists");
                false
            }
        }
    }
}
