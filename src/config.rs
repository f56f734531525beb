//! Configuration module for PESOS.

use serde::Deserialize;
use std::path::Path;

use crate::{PesosError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/pesos.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/pesos.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Feed fetching configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Allow fetching from loopback/private addresses (development only).
    #[serde(default)]
    pub allow_private_hosts: bool,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_user_agent() -> String {
    concat!(
        "PESOS/",
        env!("CARGO_PKG_VERSION"),
        " (feed synchronizer; +https://pesos.app)"
    )
    .to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            user_agent: default_user_agent(),
            allow_private_hosts: false,
        }
    }
}

/// What to do with feed entries that carry no usable publish date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDatePolicy {
    /// Stamp the entry with the time the feed was parsed.
    #[default]
    FetchTime,
    /// Drop the entry.
    Skip,
}

/// Synchronization run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Number of sources processed concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between batches in milliseconds.
    #[serde(default = "default_batch_delay")]
    pub batch_delay_ms: u64,
    /// Maximum entries taken from one feed per run.
    #[serde(default = "default_max_items")]
    pub max_items_per_feed: usize,
    /// Maximum description/content length in characters.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
    /// How long a failed feed is skipped, in seconds.
    #[serde(default = "default_failure_cooldown")]
    pub failure_cooldown_secs: u64,
    /// Maximum number of run log lines kept in memory.
    #[serde(default = "default_max_log_lines")]
    pub max_log_lines: usize,
    /// Policy for entries without a publish date.
    #[serde(default)]
    pub missing_date: MissingDatePolicy,
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_delay() -> u64 {
    100
}

fn default_max_items() -> usize {
    50
}

fn default_max_content_length() -> usize {
    50_000
}

fn default_failure_cooldown() -> u64 {
    24 * 60 * 60
}

fn default_max_log_lines() -> usize {
    1000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay(),
            max_items_per_feed: default_max_items(),
            max_content_length: default_max_content_length(),
            failure_cooldown_secs: default_failure_cooldown(),
            max_log_lines: default_max_log_lines(),
            missing_date: MissingDatePolicy::default(),
        }
    }
}

/// Periodic synchronization configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the background scheduler runs.
    #[serde(default)]
    pub enabled: bool,
    /// Interval between scheduled runs in seconds.
    #[serde(default = "default_scheduler_interval")]
    pub interval_secs: u64,
}

fn default_scheduler_interval() -> u64 {
    3600 // 1 hour
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_scheduler_interval(),
        }
    }
}

/// Web API configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WebConfig {
    /// Bearer token required by the cron endpoints. Cron routes are not
    /// mounted when empty.
    #[serde(default)]
    pub cron_secret: String,
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Feed fetching configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Synchronization run configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Web API configuration.
    #[serde(default)]
    pub web: WebConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(PesosError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| PesosError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `PESOS_CRON_SECRET`: bearer token for the cron endpoints
    /// - `PESOS_DATABASE_PATH`: path of the SQLite database
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("PESOS_CRON_SECRET") {
            if !secret.is_empty() {
                self.web.cron_secret = secret;
            }
        }
        if let Ok(path) = std::env::var("PESOS_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.sync.batch_size == 0 {
            return Err(PesosError::Validation(
                "sync.batch_size must be at least 1".to_string(),
            ));
        }
        if self.sync.max_items_per_feed == 0 {
            return Err(PesosError::Validation(
                "sync.max_items_per_feed must be at least 1".to_string(),
            ));
        }
        if self.fetch.total_timeout_secs == 0
            || self.fetch.connect_timeout_secs == 0
            || self.fetch.read_timeout_secs == 0
        {
            return Err(PesosError::Validation(
                "fetch timeouts must be greater than zero".to_string(),
            ));
        }
        if self.scheduler.enabled && self.scheduler.interval_secs == 0 {
            return Err(PesosError::Validation(
                "scheduler.interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
