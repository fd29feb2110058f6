//! Configuration loader with layered sources.

use crate::{format_validation_errors, CacheSettings, ConfigValidator};
use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use linkedall_core::CacheError;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Flat variables shared with the rest of the platform, mapped onto their
/// structured keys. Applied last so they win over files and prefixed variables.
const LEGACY_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("REDIS_HOST", "redis.host"),
    ("REDIS_PORT", "redis.port"),
    ("REDIS_PASSWORD", "redis.password"),
    ("REDIS_DB", "redis.db"),
    ("REDIS_KEY_PREFIX", "redis.key_prefix"),
    ("REDIS_DEFAULT_TTL", "cache.ttl_secs"),
];

/// Configuration loader with runtime refresh support.
#[derive(Clone)]
pub struct ConfigLoader {
    settings: Arc<RwLock<CacheSettings>>,
    config_dir: String,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `{config_dir}/default.toml` - Default values
    /// 2. `{config_dir}/{environment}.toml` - Environment-specific overrides
    /// 3. `{config_dir}/local.toml` - Local overrides
    /// 4. Environment variables with `LINKEDALL__` prefix
    /// 5. `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, `REDIS_DB`,
    ///    `REDIS_KEY_PREFIX`, `REDIS_DEFAULT_TTL`
    pub fn new(config_dir: impl Into<String>) -> Result<Self, CacheError> {
        let config_dir = config_dir.into();
        let settings = Self::load_settings(&config_dir)?;

        Ok(Self {
            settings: Arc::new(RwLock::new(settings)),
            config_dir,
        })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, CacheError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> CacheSettings {
        self.settings.read().await.clone()
    }

    /// Reloads the configuration from disk and environment.
    pub async fn reload(&self) -> Result<(), CacheError> {
        let new_settings = Self::load_settings(&self.config_dir)?;
        let mut settings = self.settings.write().await;
        *settings = new_settings;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    fn load_settings(config_dir: &str) -> Result<CacheSettings, CacheError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var("LINKEDALL_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        info!(environment = %environment, config_dir = %config_dir, "Loading cache configuration");

        let mut builder = Config::builder();

        for name in ["default", environment.as_str(), "local"] {
            let path = format!("{}/{}.toml", config_dir, name);
            if Path::new(&path).exists() {
                debug!("Loading config from: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("LINKEDALL")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder = apply_legacy_overrides(builder).map_err(config_error_to_cache_error)?;

        let settings: CacheSettings = builder
            .build()
            .and_then(Config::try_deserialize::<CacheSettings>)
            .map_err(config_error_to_cache_error)?;

        ConfigValidator::validate(&settings)
            .map_err(|errors| CacheError::Configuration(format_validation_errors(&errors)))?;

        Ok(settings)
    }
}

fn apply_legacy_overrides(
    mut builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    for (variable, key) in LEGACY_ENV_OVERRIDES {
        let value = std::env::var(variable).ok().filter(|v| !v.is_empty());
        if value.is_some() {
            debug!(variable = %variable, key = %key, "Applying environment override");
        }
        builder = builder.set_override_option(*key, value)?;
    }
    Ok(builder)
}

fn config_error_to_cache_error(err: ConfigError) -> CacheError {
    CacheError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_missing_directory_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path().join("absent").to_string_lossy()).unwrap();
        let settings = loader.get().await;
        assert_eq!(settings.cache.ttl_secs, 3600);
        assert_eq!(settings.write_back.flush_interval_ms, 5000);
    }

    #[tokio::test]
    async fn test_default_file_is_layered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "[cache]\nttl_secs = 120\n\n[write_back]\nflush_interval_ms = 250\non_cache_failure = \"skip\"\n",
        )
        .unwrap();

        let loader = ConfigLoader::new(dir.path().to_string_lossy()).unwrap();
        let settings = loader.get().await;
        assert_eq!(settings.cache.ttl_secs, 120);
        assert_eq!(settings.write_back.flush_interval_ms, 250);
        assert_eq!(settings.write_back.on_cache_failure, crate::CacheFailurePolicy::Skip);
    }

    #[tokio::test]
    async fn test_local_file_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("default.toml"), "[write_back]\nflush_interval_ms = 250\n").unwrap();
        fs::write(dir.path().join("local.toml"), "[write_back]\nflush_interval_ms = 900\n").unwrap();

        let loader = ConfigLoader::new(dir.path().to_string_lossy()).unwrap();
        assert_eq!(loader.get().await.write_back.flush_interval_ms, 900);
    }

    #[tokio::test]
    async fn test_invalid_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("default.toml"), "[write_back]\nflush_interval_ms = 0\n").unwrap();

        let result = ConfigLoader::new(dir.path().to_string_lossy());
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_reload_picks_up_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.toml");
        fs::write(&path, "[write_back]\nflush_interval_ms = 100\n").unwrap();

        let loader = ConfigLoader::new(dir.path().to_string_lossy()).unwrap();
        fs::write(&path, "[write_back]\nflush_interval_ms = 300\n").unwrap();
        loader.reload().await.unwrap();

        assert_eq!(loader.get().await.write_back.flush_interval_ms, 300);
    }
}
