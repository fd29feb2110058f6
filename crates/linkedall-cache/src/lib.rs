//! # Linked-All Cache
//!
//! Caching layer over a remote key-value store.
//!
//! - [`client`]: the [`KeyValueStore`] contract with a Redis-backed
//!   implementation and a process-local one.
//! - [`strategy`]: cache-aside reads, write-through and write-back writes.
//! - [`metrics`], [`health`]: passive counters and an availability probe.
//! - [`di`]: the shaku module used by a composition root.

pub mod client;
pub mod di;
pub mod health;
pub mod keys;
pub mod metrics;
pub mod strategy;

pub use client::*;
pub use di::*;
pub use health::*;
pub use keys::*;
pub use self::metrics::{register_metrics, CacheMetrics};
pub use strategy::*;
