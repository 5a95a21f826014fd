use serde::{Deserialize, Serialize};

use super::transform::TargetTransform;

/// Main configuration structure for Reflexion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Loop control settings
    #[serde(default)]
    pub reflexion: LoopConfig,

    /// Scorer adapter batching and retry
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Retry policy for feature proposals
    #[serde(default)]
    pub proposal: RetryConfig,

    /// External feature service
    #[serde(default)]
    pub service: ServiceConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Reflexion loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoopConfig {
    /// Iteration budget for the whole run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Number of worst residuals handed to the proposer
    #[serde(default = "default_worst_k")]
    pub worst_k: usize,

    /// Share of entities held out for validation each iteration
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,

    /// Seed for the train/validation shuffle (random when unset)
    #[serde(default)]
    pub seed: Option<u64>,

    /// Transform applied to targets before training
    #[serde(default)]
    pub target_transform: TargetTransform,
}

const fn default_max_iterations() -> usize {
    10
}

const fn default_worst_k() -> usize {
    20
}

const fn default_validation_fraction() -> f64 {
    0.2
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            worst_k: default_worst_k(),
            validation_fraction: default_validation_fraction(),
            seed: None,
            target_transform: TargetTransform::default(),
        }
    }
}

/// Scorer adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoringConfig {
    /// Entities per scorer call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Batches in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Retry policy for partially failed batches
    #[serde(default)]
    pub retry: RetryConfig,
}

const fn default_batch_size() -> usize {
    10
}

const fn default_max_concurrency() -> usize {
    4
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
            retry: RetryConfig::default(),
        }
    }
}

/// Bounded retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    200
}

const fn default_max_backoff_ms() -> u64 {
    5000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// External feature service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServiceConfig {
    /// Base URL of the proposal/scoring service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token, if the service requires one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

const fn default_timeout_secs() -> u64 {
    120
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".reflexion/reflexion.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (console only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
