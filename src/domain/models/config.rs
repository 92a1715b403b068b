use serde::{Deserialize, Serialize};

use super::conventions::ConventionConfig;
use super::sync::ConflictStrategy;

/// Main configuration structure for beadsync
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// GitHub API client configuration
    #[serde(default)]
    pub github: GitHubConfig,

    /// Retry policy for external tracker calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Sync behaviour
    #[serde(default)]
    pub sync: SyncConfig,

    /// Webhook listener
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Default label and body conventions
    #[serde(default)]
    pub conventions: ConventionConfig,
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
    ".beadsync/beadsync.db".to_string()
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

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly, never
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

/// GitHub REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitHubConfig {
    /// API root; overridden in tests and for GitHub Enterprise
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Environment variable holding the access token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Client-side request quota
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

const fn default_requests_per_hour() -> u32 {
    5000
}

fn default_user_agent() -> String {
    format!("beadsync/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            token_env: default_token_env(),
            requests_per_hour: default_requests_per_hour(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Total attempts per call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Cap on the delay between retries
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Timeout for a single attempt
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Deadline across all attempts of one call
    #[serde(default = "default_overall_timeout_ms")]
    pub overall_timeout_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    8_000
}

const fn default_call_timeout_ms() -> u64 {
    15_000
}

const fn default_overall_timeout_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            overall_timeout_ms: default_overall_timeout_ms(),
        }
    }
}

/// Sync behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Strategy used when `sync` is invoked without `--strategy`
    #[serde(default)]
    pub default_strategy: ConflictStrategy,

    /// How long processed webhook delivery ids are remembered
    #[serde(default = "default_delivery_retention_hours")]
    pub delivery_retention_hours: u64,

    /// Interval of the background delivery pruner under `serve`
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,

    /// How long a running sync holds the installation before another
    /// process may take it over
    #[serde(default = "default_lease_timeout_secs")]
    pub lease_timeout_secs: u64,

    /// How long a sync waits for another one to release the installation
    #[serde(default = "default_lease_wait_secs")]
    pub lease_wait_secs: u64,
}

const fn default_delivery_retention_hours() -> u64 {
    72
}

const fn default_prune_interval_secs() -> u64 {
    3600
}

const fn default_lease_timeout_secs() -> u64 {
    900
}

const fn default_lease_wait_secs() -> u64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_strategy: ConflictStrategy::default(),
            delivery_retention_hours: default_delivery_retention_hours(),
            prune_interval_secs: default_prune_interval_secs(),
            lease_timeout_secs: default_lease_timeout_secs(),
            lease_wait_secs: default_lease_wait_secs(),
        }
    }
}

/// Webhook listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WebhookConfig {
    /// Bind address
    #[serde(default = "default_webhook_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_webhook_port")]
    pub port: u16,

    /// Environment variable holding the webhook secret; signatures are
    /// only verified when it is set
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
}

fn default_webhook_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_webhook_port() -> u16 {
    8787
}

fn default_secret_env() -> String {
    "BEADSYNC_WEBHOOK_SECRET".to_string()
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: default_webhook_host(),
            port: default_webhook_port(),
            secret_env: default_secret_env(),
        }
    }
}
