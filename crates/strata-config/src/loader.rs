//! Configuration loader with layered sources.

use crate::AppConfig;
use config::{Config, ConfigError, Environment, File};
use std::path::Path;
use std::sync::Arc;
use strata_core::StrataError;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Configuration loader with runtime refresh support.
#[derive(Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<AppConfig>>,
    config_dir: String,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Local overrides (not committed)
    /// 4. Environment variables with `STRATA_` prefix
    pub fn new(config_dir: impl Into<String>) -> Result<Self, StrataError> {
        let config_dir = config_dir.into();
        let config = Self::load_config(&config_dir)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_dir,
        })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, StrataError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Reloads the configuration from disk.
    pub async fn reload(&self) -> Result<(), StrataError> {
        let new_config = Self::load_config(&self.config_dir)?;
        let mut config = self.config.write().await;
        *config = new_config;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Loads configuration from the specified directory.
    fn load_config(config_dir: &str) -> Result<AppConfig, StrataError> {
        // Load .env file if present
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var("STRATA_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        // 1. Load default configuration
        let default_path = format!("{}/default.toml", config_dir);
        if Path::new(&default_path).exists() {
            debug!("Loading default config from: {}", default_path);
            builder = builder.add_source(File::with_name(&default_path).required(false));
        }

        // 2. Load environment-specific configuration
        let env_path = format!("{}/{}.toml", config_dir, environment);
        if Path::new(&env_path).exists() {
            debug!("Loading environment config from: {}", env_path);
            builder = builder.add_source(File::with_name(&env_path).required(false));
        }

        // 3. Load local overrides (not committed to version control)
        let local_path = format!("{}/local.toml", config_dir);
        if Path::new(&local_path).exists() {
            debug!("Loading local config from: {}", local_path);
            builder = builder.add_source(File::with_name(&local_path).required(false));
        }

        // 4. Override with environment variables (STRATA_ prefix)
        builder = builder.add_source(
            Environment::with_prefix("STRATA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_error_to_strata_error)?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(config_error_to_strata_error)?;

        // Validate critical configuration
        Self::validate_config(&app_config)?;

        Ok(app_config)
    }

    /// Validates the configuration. Failures here are fatal by contract:
    /// this is the only point where the cache refuses to start.
    fn validate_config(config: &AppConfig) -> Result<(), StrataError> {
        if config.fast_store.url.is_empty() {
            return Err(StrataError::configuration(
                "Fast store URL is required".to_string(),
            ));
        }

        if config.durable_store.enabled && config.durable_store.url.is_empty() {
            return Err(StrataError::configuration(
                "Durable store URL is required when the durable tier is enabled".to_string(),
            ));
        }

        if config.durable_store.enabled && config.durable_store.dataset.is_empty() {
            return Err(StrataError::configuration(
                "Durable store dataset is required when the durable tier is enabled".to_string(),
            ));
        }

        let ttls = [
            ("metadata_ttl_secs", config.cache.metadata_ttl_secs),
            ("analysis_ttl_secs", config.cache.analysis_ttl_secs),
            ("stats_ttl_secs", config.cache.stats_ttl_secs),
        ];
        for (name, value) in ttls {
            if value == 0 {
                return Err(StrataError::configuration(format!(
                    "Cache TTL '{}' must be positive",
                    name
                )));
            }
        }

        Ok(())
    }
}

fn config_error_to_strata_error(err: ConfigError) -> StrataError {
    StrataError::configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_without_config_files() {
        let loader = ConfigLoader::new("./no-such-config-dir").expect("defaults should load");
        let config = loader.get().await;
        assert_eq!(config.app.name, "strata");
        assert_eq!(config.fast_store.url, "redis://localhost:6379");
    }

    #[test]
    fn test_validation_rejects_empty_fast_store_url() {
        let mut config = AppConfig::default();
        config.fast_store.url = String::new();
        let err = ConfigLoader::validate_config(&config).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_validation_rejects_zero_ttl() {
        let mut config = AppConfig::default();
        config.cache.analysis_ttl_secs = 0;
        assert!(ConfigLoader::validate_config(&config).is_err());
    }

    #[test]
    fn test_disabled_durable_tier_allows_empty_url() {
        let mut config = AppConfig::default();
        config.durable_store.enabled = false;
        config.durable_store.url = String::new();
        assert!(ConfigLoader::validate_config(&config).is_ok());
    }
}
