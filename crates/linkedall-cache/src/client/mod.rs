//! Key-value store clients.
//!
//! [`KeyValueStore`] is the minimal contract the caching strategies need
//! from a remote store: GET, SET with expiry, DEL, KEYS-by-pattern,
//! EXISTS and PING. [`RedisKvClient`] talks to Redis; [`InMemoryStore`]
//! keeps everything in process.

mod memory;
mod redis_store;

pub use memory::{glob_match, InMemoryStore};
pub use redis_store::{ConnectionState, RedisKvClient};

use async_trait::async_trait;
use linkedall_core::{CacheResult, Interface};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Capacity of the lifecycle event channel. Slow subscribers lose the
/// oldest events.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Key-value store contract used by the caching strategies.
///
/// Transport failures surface as errors on the operation that hit them;
/// only [`ping`](KeyValueStore::ping) folds failures into `false`.
#[async_trait]
pub trait KeyValueStore: Interface + Send + Sync {
    /// Returns the stored value, or `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores a value that expires after `ttl_secs` seconds.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()>;

    /// Deletes the given keys and returns how many existed.
    async fn delete(&self, keys: &[String]) -> CacheResult<u64>;

    /// Deletes every key matching a glob pattern.
    ///
    /// Returns 0 when nothing matches.
    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64>;

    /// Checks whether a key is present.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Returns `true` when the store answers a PING.
    async fn ping(&self) -> bool;

    /// Closes the client. Later operations fail with
    /// [`CacheError::ConnectionClosed`](linkedall_core::CacheError::ConnectionClosed).
    async fn close(&self) -> CacheResult<()>;

    /// Subscribes to connection lifecycle events.
    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent>;
}

/// Connection lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A connection attempt has started.
    Connecting,
    /// The first command succeeded; the connection is usable.
    Ready,
    /// The client was closed.
    Closed,
    /// A command or connection attempt failed.
    Error(String),
}

/// Broadcasts lifecycle events and logs each one.
#[derive(Debug, Clone)]
pub struct ConnectionEvents {
    sender: broadcast::Sender<ConnectionEvent>,
}

impl Default for ConnectionEvents {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl ConnectionEvents {
    /// Logs the event and forwards it to current subscribers.
    pub fn emit(&self, event: ConnectionEvent) {
        match &event {
            ConnectionEvent::Connecting => debug!("Connecting to key-value store"),
            ConnectionEvent::Ready => info!("Key-value store connection ready"),
            ConnectionEvent::Closed => info!("Key-value store connection closed"),
            ConnectionEvent::Error(message) => error!(error = %message, "Key-value store error"),
        }
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    /// Returns a new receiver for subsequent events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.sender.subscribe()
    }
}
