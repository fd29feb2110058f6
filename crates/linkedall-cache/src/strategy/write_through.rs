//! Write-through strategy.

use super::cache_aside::CacheAside;
use super::codec;
use super::options::CacheOptions;
use crate::metrics::CacheMetrics;
use linkedall_core::{CacheError, CacheResult};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use tracing::warn;

/// Persists to the system of record first, then populates the cache.
///
/// The cache is only written after the writer succeeds, so it never holds
/// a value the system of record rejected. The two writes are not atomic:
/// a failure between them leaves the cache stale or empty, never ahead.
#[derive(Clone)]
pub struct WriteThrough {
    cache: CacheAside,
}

impl WriteThrough {
    #[must_use]
    pub fn new(cache: CacheAside) -> Self {
        Self { cache }
    }

    /// The cache-aside strategy used for cache population.
    #[must_use]
    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }

    /// Runs `writer` with the value, then caches it.
    ///
    /// Returns [`CacheError::Writer`] without touching the cache when the
    /// writer fails. An encoding failure is reported after the writer has
    /// run, since the system of record does not depend on the cache format.
    pub async fn try_set<T, W, Fut, E>(&self, key: &str, value: T, writer: W, options: &CacheOptions) -> CacheResult<()>
    where
        T: Serialize,
        W: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let payload = codec::encode(&value, options.serialize);

        writer(value)
            .await
            .map_err(|e| CacheError::writer(options.full_key(key), e))?;

        self.cache.store_encoded(key, &payload?, options).await
    }

    /// Non-failing form of [`try_set`](Self::try_set). Returns `false` when
    /// either write fails.
    pub async fn set<T, W, Fut, E>(&self, key: &str, value: T, writer: W, options: &CacheOptions) -> bool
    where
        T: Serialize,
        W: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        match self.try_set(key, value, writer, options).await {
            Ok(()) => true,
            Err(CacheError::Writer { key, message }) => {
                warn!(key = %key, error = %message, "System-of-record write failed, cache left untouched");
                CacheMetrics::error("write_through");
                false
            }
            Err(e) => {
                warn!(key = %options.full_key(key), error = %e, "Write-through cache population failed");
                CacheMetrics::error("set");
                false
            }
        }
    }
}
