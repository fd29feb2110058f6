//! Common test infrastructure for cache integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use linkedall_cache::{CacheAside, ConnectionEvent, ConnectionEvents, InMemoryStore, KeyValueStore, RedisKvClient};
use linkedall_config::RedisConfig;
use linkedall_core::{init_tracing, CacheError, CacheResult, TelemetryConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::redis::Redis;
use tokio::sync::broadcast;

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = init_tracing(&TelemetryConfig::default());
}

/// Cache-aside over a fresh in-memory store.
pub fn memory_cache() -> (Arc<InMemoryStore>, CacheAside) {
    init_test_tracing();
    let store = Arc::new(InMemoryStore::new());
    let cache = CacheAside::new(store.clone());
    (store, cache)
}

/// Cache-aside over a store that rejects every command.
pub fn failing_cache() -> (Arc<FailingStore>, CacheAside) {
    init_test_tracing();
    let store = Arc::new(FailingStore::default());
    let cache = CacheAside::new(store.clone());
    (store, cache)
}

/// Store that simulates an outage: every command fails with a connection error.
#[derive(Default)]
pub struct FailingStore {
    calls: AtomicU32,
    events: ConnectionEvents,
}

impl FailingStore {
    /// Number of commands attempted against the store.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> CacheResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.events.emit(ConnectionEvent::Error("connection refused".to_string()));
        Err(CacheError::Connection("connection refused".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        self.fail()
    }

    async fn set_with_expiry(&self, _key: &str, _value: &str, _ttl_secs: u64) -> CacheResult<()> {
        self.fail()
    }

    async fn delete(&self, _keys: &[String]) -> CacheResult<u64> {
        self.fail()
    }

    async fn delete_by_pattern(&self, _pattern: &str) -> CacheResult<u64> {
        self.fail()
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        self.fail()
    }

    async fn ping(&self) -> bool {
        self.fail::<()>().is_ok()
    }

    async fn close(&self) -> CacheResult<()> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}

/// Records every system-of-record write it is asked to perform.
#[derive(Clone, Default)]
pub struct RecordingDb {
    writes: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

impl RecordingDb {
    pub fn writes(&self) -> Vec<(String, serde_json::Value)> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// Write-back writer that records `(key, value)` and succeeds.
    pub fn writer<T: serde::Serialize + Send + 'static>(
        &self,
    ) -> impl FnOnce(String, T) -> futures::future::Ready<Result<(), String>> + Send + 'static {
        let writes = Arc::clone(&self.writes);
        move |key, value| {
            let value = serde_json::to_value(&value).map_err(|e| e.to_string());
            futures::future::ready(value.map(|value| writes.lock().push((key, value))))
        }
    }

    /// Write-back writer that records the attempt and then fails.
    pub fn failing_writer<T: serde::Serialize + Send + 'static>(
        &self,
    ) -> impl FnOnce(String, T) -> futures::future::Ready<Result<(), String>> + Send + 'static {
        let writes = Arc::clone(&self.writes);
        move |key, value| {
            if let Ok(value) = serde_json::to_value(&value) {
                writes.lock().push((key.clone(), value));
            }
            futures::future::ready(Err(format!("write rejected for {}", key)))
        }
    }
}

/// Redis testcontainer wrapper.
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    config: RedisConfig,
}

impl TestRedis {
    /// Starts a fresh Redis container.
    pub async fn new() -> Self {
        init_test_tracing();

        let container = Redis::default()
            .start()
            .await
            .expect("Failed to start Redis container");

        let port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");

        let config = RedisConfig {
            host: "127.0.0.1".to_string(),
            port,
            key_prefix: "test:".to_string(),
            ..RedisConfig::default()
        };

        Self {
            _container: container,
            config,
        }
    }

    pub fn config(&self) -> RedisConfig {
        self.config.clone()
    }

    pub fn client(&self) -> Arc<RedisKvClient> {
        Arc::new(RedisKvClient::new(self.config()))
    }
}
