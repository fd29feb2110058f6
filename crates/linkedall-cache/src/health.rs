//! Cache availability probe.

use crate::client::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Probe status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

/// Result of a cache health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Round-trip time of the probe in milliseconds.
    pub latency_ms: u64,
    pub checked_at: DateTime<Utc>,
}

impl CacheHealth {
    /// Returns `true` when the store answered.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.status == HealthStatus::Up
    }
}

/// Pings the store and reports its status and latency.
pub async fn check_cache(store: &dyn KeyValueStore) -> CacheHealth {
    let started = Instant::now();
    let available = store.ping().await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (status, message) = if available {
        (HealthStatus::Up, None)
    } else {
        (HealthStatus::Down, Some("Cache not available".to_string()))
    };

    CacheHealth {
        status,
        message,
        latency_ms,
        checked_at: Utc::now(),
    }
}
