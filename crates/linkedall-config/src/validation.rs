//! Configuration validation module.
//!
//! Provides validation for all configuration values, failing fast on
//! invalid configuration rather than on the first cache call.

use crate::CacheSettings;
use std::fmt;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Store host is empty.
    EmptyHost,
    /// Port number is invalid (must be 1-65535).
    InvalidPort { value: u16 },
    /// Logical database index is out of range.
    InvalidDatabase { value: u8, maximum: u8 },
    /// Pool size must be at least one.
    EmptyPool,
    /// Timeout or interval value must be positive.
    NonPositiveDuration { name: String },
    /// Backoff cap is smaller than a single step.
    RetryCapBelowStep { step_ms: u64, cap_ms: u64 },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyHost => write!(f, "Redis host must not be empty"),
            Self::InvalidPort { value } => {
                write!(f, "Invalid Redis port: {} (must be 1-65535)", value)
            }
            Self::InvalidDatabase { value, maximum } => {
                write!(f, "Invalid Redis database index: {} (maximum {})", value, maximum)
            }
            Self::EmptyPool => write!(f, "Redis pool size must be at least 1"),
            Self::NonPositiveDuration { name } => {
                write!(f, "'{}' must be positive", name)
            }
            Self::RetryCapBelowStep { step_ms, cap_ms } => {
                write!(
                    f,
                    "Retry cap ({}ms) cannot be smaller than the retry step ({}ms)",
                    cap_ms, step_ms
                )
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Highest logical database index of a default Redis deployment.
    const MAX_DATABASE: u8 = 15;

    /// Validates the entire cache configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(settings: &CacheSettings) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        Self::validate_redis(&settings.redis, &mut errors);
        Self::validate_strategies(settings, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_redis(config: &crate::RedisConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.host.trim().is_empty() {
            errors.push(ConfigValidationError::EmptyHost);
        }
        if config.port == 0 {
            errors.push(ConfigValidationError::InvalidPort { value: config.port });
        }
        if config.db > Self::MAX_DATABASE {
            errors.push(ConfigValidationError::InvalidDatabase {
                value: config.db,
                maximum: Self::MAX_DATABASE,
            });
        }
        if config.pool_size == 0 {
            errors.push(ConfigValidationError::EmptyPool);
        }
        if config.connect_timeout_ms == 0 {
            errors.push(ConfigValidationError::NonPositiveDuration {
                name: "redis.connect_timeout_ms".to_string(),
            });
        }
        if config.command_timeout_ms == 0 {
            errors.push(ConfigValidationError::NonPositiveDuration {
                name: "redis.command_timeout_ms".to_string(),
            });
        }
        if config.retry_max_delay_ms < config.retry_step_ms {
            errors.push(ConfigValidationError::RetryCapBelowStep {
                step_ms: config.retry_step_ms,
                cap_ms: config.retry_max_delay_ms,
            });
        }
    }

    fn validate_strategies(settings: &CacheSettings, errors: &mut Vec<ConfigValidationError>) {
        if settings.cache.ttl_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveDuration {
                name: "cache.ttl_secs".to_string(),
            });
        }
        if settings.write_back.flush_interval_ms == 0 {
            errors.push(ConfigValidationError::NonPositiveDuration {
                name: "write_back.flush_interval_ms".to_string(),
            });
        }
    }
}

/// Formats validation errors into a single human-readable message.
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    let lines: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
    format!("Configuration validation failed:\n{}", lines.join("\n"))
}
