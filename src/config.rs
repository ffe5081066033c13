use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;
const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Engine configuration with validation.
///
/// The engine has no storage or network surface of its own, so this stays
/// small: logging behavior, the event channel depth, and the bound on
/// internal retries when an optimistic commit loses a race.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Capacity of the domain event channel
    #[validate(range(min = 1, max = 65536))]
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// Internal retry bound when a versioned commit loses a race
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            event_buffer_size: default_event_buffer_size(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum EngineConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (FLOCKLEDGER__*)
pub fn load_config() -> Result<EngineConfig, EngineConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("FLOCKLEDGER_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("event_buffer_size", DEFAULT_EVENT_BUFFER_SIZE as i64)?
        .set_default("max_conflict_retries", DEFAULT_MAX_CONFLICT_RETRIES as i64)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("FLOCKLEDGER").separator("__"))
        .build()?;

    let engine_config: EngineConfig = config.try_deserialize()?;

    engine_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        EngineConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(engine_config)
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_event_buffer_size() -> usize {
    DEFAULT_EVENT_BUFFER_SIZE
}

fn default_max_conflict_retries() -> u32 {
    DEFAULT_MAX_CONFLICT_RETRIES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.environment, "development");
        assert_eq!(config.max_conflict_retries, 3);
        assert_eq!(config.event_buffer_size, 100);
    }

    #[test]
    fn zero_retry_bound_fails_validation() {
        let config = EngineConfig {
            max_conflict_retries: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_event_buffer_fails_validation() {
        let config = EngineConfig {
            event_buffer_size: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
