//! Configuration Loader
//!
//! Environment-aware configuration loading. Merges, in increasing priority:
//! code defaults, `changeflow.toml`, `changeflow.{environment}.toml`, and
//! `CHANGEFLOW__SECTION__FIELD` environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::ChangeflowConfig;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ENV_PREFIX: &str = "CHANGEFLOW";
const ENV_SEPARATOR: &str = "__";
const BASE_FILE_STEM: &str = "changeflow";

/// Loaded, validated configuration plus the context it was loaded from
#[derive(Debug)]
pub struct ConfigManager {
    config: ChangeflowConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_overrides(config_dir, environment, None)
    }

    /// Load with an explicit variable map standing in for the process environment.
    ///
    /// Tests use this to exercise overrides without mutating global state.
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        env_overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::load_and_merge(&config_directory, environment, env_overrides)?;
        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&config.sanitized())
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        info!(
            environment = %environment,
            server = %config.remote.server,
            enabled = config.enabled,
            max_attempts = config.poller.max_attempts,
            poll_interval_ms = config.poller.poll_interval_ms,
            "Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration (validated here)
    pub fn from_config(config: ChangeflowConfig, environment: &str) -> ConfigResult<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ChangeflowConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect environment from `CHANGEFLOW_ENV` (default: development)
    pub fn detect_environment() -> String {
        env::var("CHANGEFLOW_ENV").unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("CHANGEFLOW_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn load_and_merge(
        config_directory: &Path,
        environment: &str,
        env_overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<ChangeflowConfig> {
        let defaults = Config::try_from(&ChangeflowConfig::default())
            .map_err(|e| ConfigurationError::load_failed(environment, e))?;

        let base_file = config_directory.join(BASE_FILE_STEM);
        let env_file = config_directory.join(format!("{BASE_FILE_STEM}.{environment}"));

        let settings = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(&base_file.to_string_lossy()).required(false))
            .add_source(File::with_name(&env_file.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env_overrides),
            )
            .build()
            .map_err(|e| ConfigurationError::load_failed(environment, e))?;

        settings
            .try_deserialize::<ChangeflowConfig>()
            .map_err(ConfigurationError::invalid_structure)
    }
}
