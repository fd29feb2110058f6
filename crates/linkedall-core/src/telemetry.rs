//! Tracing initialisation for processes embedding the cache layer.

#[cfg(feature = "telemetry")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::CacheResult;
use serde::{Deserialize, Serialize};

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// Include the event target in each line.
    #[serde(default = "default_with_target")]
    pub with_target: bool,
}

fn default_log_level() -> String {
    "info,linkedall=debug".to_string()
}

fn default_with_target() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
            with_target: default_with_target(),
        }
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.log_level`. A subscriber that is already
/// installed (tests, embedding applications) is left in place.
#[cfg(feature = "telemetry")]
pub fn init_tracing(config: &TelemetryConfig) -> CacheResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| crate::CacheError::Configuration(format!("Invalid log filter '{}': {}", config.log_level, e)))?;

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(config.with_target))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(config.with_target))
            .try_init()
    };

    match installed {
        Ok(()) => tracing::info!(json = config.json, level = %config.log_level, "Tracing initialized"),
        Err(e) => tracing::debug!(error = %e, "Tracing subscriber already installed"),
    }

    Ok(())
}

/// Placeholder for when telemetry feature is disabled.
#[cfg(not(feature = "telemetry"))]
pub fn init_tracing(_config: &TelemetryConfig) -> CacheResult<()> {
    Ok(())
}
