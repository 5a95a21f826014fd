use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{Config, RetryConfig};

/// Project-local configuration file, created by the user.
pub const PROJECT_CONFIG: &str = ".reflexion/config.yaml";
/// Optional local overrides, typically git-ignored.
pub const LOCAL_CONFIG: &str = ".reflexion/local.yaml";
pub const ENV_PREFIX: &str = "REFLEXION_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(usize),

    #[error("Invalid worst_k: {0}. Must be at least 1")]
    InvalidWorstK(usize),

    #[error("Invalid validation_fraction: {0}. Must be strictly between 0 and 1")]
    InvalidValidationFraction(f64),

    #[error("Invalid scoring batch_size: {0}. Must be at least 1")]
    InvalidBatchSize(usize),

    #[error("Invalid scoring max_concurrency: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    #[error("Invalid {0} max_attempts: 0. Must be at least 1")]
    InvalidMaxAttempts(&'static str),

    #[error(
        "Invalid {0} backoff: initial_backoff_ms ({1}) must not exceed max_backoff_ms ({2})"
    )]
    InvalidBackoff(&'static str, u64, u64),

    #[error("Service base_url cannot be empty")]
    EmptyBaseUrl,

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. .reflexion/config.yaml
    /// 3. .reflexion/local.yaml
    /// 4. Environment variables (REFLEXION_* prefix, `__` between sections)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(PROJECT_CONFIG))
            .merge(Yaml::file(LOCAL_CONFIG))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file. Environment variables still override it.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let reflexion = &config.reflexion;
        if reflexion.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(reflexion.max_iterations));
        }
        if reflexion.worst_k == 0 {
            return Err(ConfigError::InvalidWorstK(reflexion.worst_k));
        }
        let fraction = reflexion.validation_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ConfigError::InvalidValidationFraction(fraction));
        }

        if config.scoring.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(config.scoring.batch_size));
        }
        if config.scoring.max_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(config.scoring.max_concurrency));
        }
        validate_retry("scoring", &config.scoring.retry)?;
        validate_retry("proposal", &config.proposal)?;

        if config.service.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        if !["json", "pretty"].contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        if !["daily", "hourly", "never"].contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}

fn validate_retry(section: &'static str, retry: &RetryConfig) -> Result<(), ConfigError> {
    if retry.max_attempts == 0 {
        return Err(ConfigError::InvalidMaxAttempts(section));
    }
    if retry.initial_backoff_ms > retry.max_backoff_ms {
        return Err(ConfigError::InvalidBackoff(
            section,
            retry.initial_backoff_ms,
            retry.max_backoff_ms,
        ));
    }
    Ok(())
}
