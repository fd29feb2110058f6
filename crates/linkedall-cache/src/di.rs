//! Dependency injection module using Shaku.
//!
//! The composition root builds one [`CacheModule`] per process and resolves
//! the shared [`KeyValueStore`] from it, then wires the strategies with
//! [`CacheStrategies::new`].

use crate::client::{KeyValueStore, RedisKvClient};
use crate::strategy::{CacheAside, WriteBack, WriteThrough};
use linkedall_config::{CacheSettings, RedisConfig};
use linkedall_core::{module, HasComponent};
use std::sync::Arc;

// Cache module.
// Contains the Redis key-value client shared by every strategy.
module! {
    pub CacheModule {
        components = [
            RedisKvClient,
        ],
        providers = [],
    }
}

/// Builds the cache module around a Redis client.
///
/// No connection is opened here; the client connects on its first command.
#[must_use]
pub fn build_cache_module(config: &RedisConfig) -> Arc<CacheModule> {
    let module = CacheModule::builder()
        .with_component_override::<dyn KeyValueStore>(Box::new(RedisKvClient::new(config.clone())))
        .build();

    Arc::new(module)
}

/// Resolves the shared key-value store.
#[must_use]
pub fn kv_store(module: &CacheModule) -> Arc<dyn KeyValueStore> {
    module.resolve()
}

/// The three strategies wired to one store.
pub struct CacheStrategies {
    pub cache_aside: CacheAside,
    pub write_through: WriteThrough,
    pub write_back: WriteBack,
}

impl CacheStrategies {
    /// Wires the strategies from settings. Spawns the write-back worker, so
    /// it must run inside a Tokio runtime.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, settings: &CacheSettings) -> Self {
        let cache_aside = CacheAside::with_defaults(store, &settings.cache);
        Self {
            write_through: WriteThrough::new(cache_aside.clone()),
            write_back: WriteBack::new(cache_aside.clone(), settings.write_back.clone()),
            cache_aside,
        }
    }

    /// Flushes pending write-back entries and closes the store.
    pub async fn shutdown(&self) {
        self.write_back.shutdown().await;
        if let Err(e) = self.cache_aside.store().close().await {
            tracing::warn!(error = %e, "Failed to close key-value store");
        }
    }
}
