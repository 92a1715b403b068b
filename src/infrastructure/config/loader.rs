use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project configuration file, created by `beadsync connect`.
pub const PROJECT_CONFIG_PATH: &str = ".beadsync/config.yaml";
/// Optional local overrides, not meant to be committed.
pub const LOCAL_CONFIG_PATH: &str = ".beadsync/local.yaml";
/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "BEADSYNC_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Unknown `logging.level`.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown `logging.format`.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Unknown `logging.rotation`.
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    /// `database.path` is empty.
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    /// `database.max_connections` is 0.
    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    /// `retry.max_attempts` is 0.
    #[error("Invalid max_attempts: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    /// Initial backoff not below the cap.
    InvalidBackoff(u64, u64),

    /// A timeout is 0.
    #[error("Invalid timeout: {0} cannot be 0")]
    InvalidTimeout(&'static str),

    /// `github.requests_per_hour` is 0.
    #[error("Invalid requests_per_hour: {0}. Must be at least 1")]
    InvalidRequestsPerHour(u32),

    /// A priority label maps outside 0..=4.
    #[error("Invalid priority label '{0}': {1} is outside 0..=4")]
    InvalidPriorityLabel(String, u8),

    /// `webhook.host` is empty.
    #[error("Webhook host cannot be empty")]
    EmptyWebhookHost,

    /// Any other invalid value.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .beadsync/config.yaml (project config)
    /// 3. .beadsync/local.yaml (project local overrides, optional)
    /// 4. Environment variables (BEADSYNC_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(PROJECT_CONFIG_PATH))
            .merge(Yaml::file(LOCAL_CONFIG_PATH))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file; environment overrides
    /// still apply on top of it.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        if !path.as_ref().is_file() {
            bail!("Config file not found: {}", path.as_ref().display());
        }
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        if config.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.retry.max_attempts));
        }
        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }
        if config.retry.call_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout("retry.call_timeout_ms"));
        }
        if config.retry.overall_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout("retry.overall_timeout_ms"));
        }

        if config.github.requests_per_hour == 0 {
            return Err(ConfigError::InvalidRequestsPerHour(config.github.requests_per_hour));
        }
        if config.github.api_base_url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("github.api_base_url cannot be empty".to_string()));
        }

        if let Some((label, value)) = config.conventions.invalid_priority_labels().first() {
            return Err(ConfigError::InvalidPriorityLabel((*label).to_string(), *value));
        }

        if config.webhook.host.trim().is_empty() {
            return Err(ConfigError::EmptyWebhookHost);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ConflictStrategy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".beadsync/beadsync.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.sync.default_strategy, ConflictStrategy::NewestWins);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
  max_connections: 2
logging:
  level: debug
  format: json
sync:
  default_strategy: beads-wins
conventions:
  labels:
    status:
      in_progress: doing
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.sync.default_strategy, ConflictStrategy::BeadsWins);
        assert_eq!(config.conventions.labels.status.in_progress.as_deref(), Some("doing"));
        assert_eq!(config.github.requests_per_hour, 5000);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "verbose"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format_and_rotation() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));

        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogRotation(_))
        ));
    }

    #[test]
    fn test_validate_database() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyDatabasePath)));

        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConnections(0))
        ));
    }

    #[test]
    fn test_validate_retry() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxAttempts(0))
        ));

        let mut config = Config::default();
        config.retry.initial_backoff_ms = 30000;
        config.retry.max_backoff_ms = 10000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(30000, 10000))
        ));

        let mut config = Config::default();
        config.retry.call_timeout_ms = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTimeout("retry.call_timeout_ms"))
        ));
    }

    #[test]
    fn test_validate_github_and_webhook() {
        let mut config = Config::default();
        config.github.requests_per_hour = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRequestsPerHour(0))
        ));

        let mut config = Config::default();
        config.webhook.host = "  ".to_string();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyWebhookHost)));
    }

    #[test]
    fn test_validate_priority_labels() {
        let mut config = Config::default();
        config.conventions.labels.priority.insert("P7".to_string(), 7);
        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidPriorityLabel(label, value) => {
                assert_eq!(label, "P7");
                assert_eq!(value, 7);
            }
            other => panic!("Expected InvalidPriorityLabel error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "logging:\n  level: warn\n  format: json\nwebhook:\n  port: 9000").unwrap();
        file.flush().unwrap();

        temp_env::with_vars(
            [
                ("BEADSYNC_LOGGING__LEVEL", Some("debug")),
                ("BEADSYNC_RETRY__MAX_ATTEMPTS", Some("5")),
            ],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.logging.level, "debug", "Environment should win");
                assert_eq!(config.logging.format, "json", "File value should persist");
                assert_eq!(config.webhook.port, 9000);
                assert_eq!(config.retry.max_attempts, 5);
            },
        );
    }

    #[test]
    fn test_load_from_file_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::load_from_file(dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "retry:\n  max_attempts: 0").unwrap();
        file.flush().unwrap();

        temp_env::with_vars_unset(["BEADSYNC_RETRY__MAX_ATTEMPTS"], || {
            let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
            assert!(err.to_string().contains("max_attempts"));
        });
    }

    #[test]
    fn test_hierarchical_merging() {
        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(base_file, "logging:\n  level: info\n  format: json\ndatabase:\n  max_connections: 3").unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "logging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.logging.level, "debug", "Override should win for nested fields");
        assert_eq!(config.logging.format, "json", "Base value should persist when not overridden");
        assert_eq!(config.database.max_connections, 3);
    }
}
