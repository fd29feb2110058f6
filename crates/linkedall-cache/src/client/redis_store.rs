//! Redis-backed key-value client.

use super::{ConnectionEvent, ConnectionEvents, KeyValueStore};
use crate::metrics::CacheMetrics;
use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, PoolError, Runtime};
use linkedall_config::RedisConfig;
use linkedall_core::{CacheError, CacheResult};
use linkedall_resilience::{with_timeout, RetryPolicy, RetryStrategy};
use parking_lot::RwLock;
use redis::{AsyncCommands, RedisError, RedisResult};
use shaku::Component;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Lifecycle of the pooled connection.
#[derive(Default)]
pub enum ConnectionState {
    /// No command issued yet; nothing is connected.
    #[default]
    Idle,
    /// Pool created; connections are opened on demand.
    Open(Pool),
    /// Explicitly closed.
    Closed,
}

/// Redis client with lazy connection, per-request retry, and a transparent
/// key prefix.
///
/// The configured `key_prefix` is prepended to every key and to every
/// pattern passed to [`delete_by_pattern`](KeyValueStore::delete_by_pattern).
/// Construct one per process at the composition root and share it.
#[derive(Component)]
#[shaku(interface = KeyValueStore)]
pub struct RedisKvClient {
    config: RedisConfig,
    retry_strategy: Option<RetryStrategy>,
    state: RwLock<ConnectionState>,
    ready: AtomicBool,
    events: ConnectionEvents,
}

impl RedisKvClient {
    /// Creates a client. No connection is opened until the first command.
    #[must_use]
    pub fn new(config: RedisConfig) -> Self {
        Self {
            config,
            retry_strategy: None,
            state: RwLock::new(ConnectionState::Idle),
            ready: AtomicBool::new(false),
            events: ConnectionEvents::default(),
        }
    }

    /// Creates a client that retries on `strategy` instead of the linear
    /// schedule derived from the configuration. The per-request retry budget
    /// still comes from `max_retries_per_request`.
    #[must_use]
    pub fn with_retry_strategy(config: RedisConfig, strategy: RetryStrategy) -> Self {
        Self {
            retry_strategy: Some(strategy),
            ..Self::new(config)
        }
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Returns `true` once [`close`](KeyValueStore::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(*self.state.read(), ConnectionState::Closed)
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    fn retry_policy(&self) -> RetryPolicy {
        let strategy = self.retry_strategy.clone().unwrap_or_else(|| {
            RetryStrategy::linear(self.config.retry_step(), self.config.retry_max_delay())
        });
        RetryPolicy::new(strategy, self.config.max_retries_per_request)
    }

    /// Returns the pool, creating it on first use.
    fn pool(&self) -> CacheResult<Pool> {
        match &*self.state.read() {
            ConnectionState::Open(pool) => return Ok(pool.clone()),
            ConnectionState::Closed => return Err(CacheError::ConnectionClosed),
            ConnectionState::Idle => {}
        }

        let mut state = self.state.write();
        match &*state {
            ConnectionState::Open(pool) => Ok(pool.clone()),
            ConnectionState::Closed => Err(CacheError::ConnectionClosed),
            ConnectionState::Idle => {
                self.events.emit(ConnectionEvent::Connecting);
                let pool = self.create_pool()?;
                *state = ConnectionState::Open(pool.clone());
                Ok(pool)
            }
        }
    }

    fn create_pool(&self) -> CacheResult<Pool> {
        deadpool_redis::Config::from_url(self.config.connection_url())
            .builder()
            .map_err(|e| CacheError::configuration(format!("Invalid Redis configuration: {}", e)))?
            .max_size(self.config.pool_size)
            .runtime(Runtime::Tokio1)
            .create_timeout(Some(self.config.connect_timeout()))
            .wait_timeout(Some(self.config.connect_timeout()))
            .build()
            .map_err(|e| CacheError::Connection(format!("Failed to create Redis pool: {}", e)))
    }

    fn mark_ready(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            self.events.emit(ConnectionEvent::Ready);
        }
    }

    /// Runs a command with retry and records its duration.
    async fn run<T, F, Fut>(&self, command: &'static str, op: F) -> CacheResult<T>
    where
        F: Fn(Connection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let started = Instant::now();
        let result = self
            .retry_policy()
            .execute(CacheError::is_retriable, || self.attempt(command, &op))
            .await;
        CacheMetrics::operation_duration(command, started.elapsed());
        result
    }

    async fn attempt<T, F, Fut>(&self, command: &'static str, op: &F) -> CacheResult<T>
    where
        F: Fn(Connection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let pool = self.pool()?;
        let outcome = with_timeout(self.config.command_timeout(), || async {
            let conn = pool.get().await.map_err(map_pool_error)?;
            op(conn).await.map_err(|e| map_redis_error(command, &e))
        })
        .await;

        match &outcome {
            Ok(_) => self.mark_ready(),
            Err(CacheError::ConnectionClosed) => {}
            Err(e) => self.events.emit(ConnectionEvent::Error(e.to_string())),
        }
        outcome
    }
}

#[async_trait]
impl KeyValueStore for RedisKvClient {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let key = self.prefixed(key);
        self.run("GET", |mut conn| {
            let key = key.clone();
            async move { conn.get::<_, Option<String>>(key).await }
        })
        .await
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()> {
        let key = self.prefixed(key);
        self.run("SETEX", |mut conn| {
            let key = key.clone();
            let value = value.to_string();
            async move { conn.set_ex::<_, _, ()>(key, value, ttl_secs).await }
        })
        .await?;

        debug!(key = %key, ttl_secs, "Stored key");
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys: Vec<String> = keys.iter().map(|k| self.prefixed(k)).collect();
        self.run("DEL", |mut conn| {
            let keys = keys.clone();
            async move { conn.del::<_, u64>(keys).await }
        })
        .await
    }

    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let pattern = self.prefixed(pattern);
        let keys: Vec<String> = self
            .run("KEYS", |mut conn| {
                let pattern = pattern.clone();
                async move {
                    let keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?;
                    Ok(keys)
                }
            })
            .await?;

        if keys.is_empty() {
            return Ok(0);
        }

        // KEYS returns full keys; delete them as-is.
        let deleted = self
            .run("DEL", |mut conn| {
                let keys = keys.clone();
                async move { conn.del::<_, u64>(keys).await }
            })
            .await?;

        debug!(pattern = %pattern, deleted, "Deleted keys by pattern");
        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let key = self.prefixed(key);
        self.run("EXISTS", |mut conn| {
            let key = key.clone();
            async move { conn.exists::<_, bool>(key).await }
        })
        .await
    }

    async fn ping(&self) -> bool {
        let result = self
            .run("PING", |mut conn| async move {
                let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
                Ok(pong)
            })
            .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Redis ping failed");
                false
            }
        }
    }

    async fn close(&self) -> CacheResult<()> {
        let previous = std::mem::replace(&mut *self.state.write(), ConnectionState::Closed);
        match previous {
            ConnectionState::Closed => return Ok(()),
            ConnectionState::Open(pool) => pool.close(),
            ConnectionState::Idle => {}
        }
        self.ready.store(false, Ordering::SeqCst);
        self.events.emit(ConnectionEvent::Closed);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}

fn map_pool_error(err: PoolError) -> CacheError {
    match err {
        PoolError::Closed => CacheError::ConnectionClosed,
        PoolError::Timeout(kind) => CacheError::Timeout(format!("Redis pool timeout: {:?}", kind)),
        PoolError::Backend(e) => map_redis_error("CONNECT", &e),
        other => CacheError::Connection(format!("Failed to get Redis connection: {}", other)),
    }
}

fn map_redis_error(command: &'static str, err: &RedisError) -> CacheError {
    if err.is_timeout() {
        CacheError::Timeout(format!("{} timed out: {}", command, err))
    } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        CacheError::Connection(err.to_string())
    } else {
        CacheError::command(command, err.to_string())
    }
}
