//! Cache configuration structures.

use linkedall_core::TelemetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the cache layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Key-value store connection.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Strategy defaults.
    #[serde(default)]
    pub cache: CacheDefaults,

    /// Write-back flush behaviour.
    #[serde(default)]
    pub write_back: WriteBackConfig,

    /// Logging.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Redis connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Store host.
    pub host: String,
    /// Store port.
    pub port: u16,
    /// Authentication credential.
    pub password: Option<String>,
    /// Logical database index.
    pub db: u8,
    /// Namespace the client prepends to every key it sends.
    pub key_prefix: String,
    /// Connection pool size.
    pub pool_size: usize,
    /// Timeout for establishing a connection in milliseconds.
    pub connect_timeout_ms: u64,
    /// Timeout for a single command round-trip in milliseconds.
    pub command_timeout_ms: u64,
    /// Retries applied to each command after the first attempt.
    pub max_retries_per_request: u32,
    /// Linear backoff step in milliseconds.
    pub retry_step_ms: u64,
    /// Upper bound for the backoff delay in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            key_prefix: "linked-all:".to_string(),
            pool_size: 10,
            connect_timeout_ms: 5000,
            command_timeout_ms: 5000,
            max_retries_per_request: 3,
            retry_step_ms: 50,
            retry_max_delay_ms: 2000,
        }
    }
}

impl RedisConfig {
    /// Returns the connection URL understood by the Redis client.
    #[must_use]
    pub fn connection_url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => format!("redis://:{}@{}:{}/{}", password, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    /// Returns the connect timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the command timeout as a Duration.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Returns the backoff step as a Duration.
    #[must_use]
    pub const fn retry_step(&self) -> Duration {
        Duration::from_millis(self.retry_step_ms)
    }

    /// Returns the backoff cap as a Duration.
    #[must_use]
    pub const fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

/// Defaults applied by the caching strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheDefaults {
    /// TTL used when a call does not specify one, in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheDefaults {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

impl CacheDefaults {
    /// Returns the default TTL as a Duration.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// What a write-back `set` does with the deferred write when the immediate
/// cache write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheFailurePolicy {
    /// Queue the system-of-record write anyway.
    #[default]
    Enqueue,
    /// Drop the value; nothing is persisted.
    Skip,
}

/// Write-back configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteBackConfig {
    /// Delay between the first pending write and the batch flush, in milliseconds.
    pub flush_interval_ms: u64,
    /// Behaviour when the immediate cache write fails.
    pub on_cache_failure: CacheFailurePolicy,
}

impl Default for WriteBackConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 5000,
            on_cache_failure: CacheFailurePolicy::Enqueue,
        }
    }
}

impl WriteBackConfig {
    /// Returns the flush interval as a Duration.
    #[must_use]
    pub const fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_defaults() {
        let config = RedisConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6379);
        assert_eq!(config.db, 0);
        assert_eq!(config.key_prefix, "linked-all:");
        assert_eq!(config.max_retries_per_request, 3);
        assert_eq!(config.retry_max_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_connection_url_without_password() {
        let config = RedisConfig::default();
        assert_eq!(config.connection_url(), "redis://localhost:6379/0");
    }

    #[test]
    fn test_connection_url_with_password() {
        let config = RedisConfig {
            host: "cache.internal".to_string(),
            password: Some("s3cret".to_string()),
            db: 2,
            ..Default::default()
        };
        assert_eq!(config.connection_url(), "redis://:s3cret@cache.internal:6379/2");
    }

    #[test]
    fn test_empty_password_is_ignored() {
        let config = RedisConfig {
            password: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(config.connection_url(), "redis://localhost:6379/0");
    }

    #[test]
    fn test_strategy_defaults() {
        let settings = CacheSettings::default();
        assert_eq!(settings.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(settings.write_back.flush_interval(), Duration::from_secs(5));
        assert_eq!(settings.write_back.on_cache_failure, CacheFailurePolicy::Enqueue);
    }

    #[test]
    fn test_partial_section_deserializes_with_defaults() {
        let settings: CacheSettings =
            serde_json::from_str(r#"{"redis":{"port":6380},"write_back":{"on_cache_failure":"skip"}}"#).unwrap();
        assert_eq!(settings.redis.port, 6380);
        assert_eq!(settings.redis.host, "localhost");
        assert_eq!(settings.write_back.on_cache_failure, CacheFailurePolicy::Skip);
        assert_eq!(settings.write_back.flush_interval_ms, 5000);
    }
}
