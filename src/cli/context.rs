//! Shared wiring for CLI commands: configuration, database, stored
//! connection, and the orchestrator for the connected repository.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::github::{GitHubClient, RetryingTracker};
use crate::adapters::sqlite::{
    initialize_database, SqliteDeliveryLog, SqliteInstallationRepository, SqliteIssueStore,
    SqliteMappingStore, SqliteSettingsStore,
};
use crate::domain::errors::DomainResult;
use crate::domain::models::{Config, Installation};
use crate::domain::ports::{InstallationRepository, SettingsStore};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::retry::RetryPolicy;
use crate::services::{SyncLease, SyncOrchestrator};

/// Settings key for the repository owner.
pub const OWNER_KEY: &str = "github.owner";
/// Settings key for the repository name.
pub const REPO_KEY: &str = "github.repo";
/// Settings key for the installation id.
pub const INSTALLATION_KEY: &str = "github.installation_id";
/// Settings key for the last successful sync time.
pub const LAST_SYNC_KEY: &str = "github.last_sync";

/// Every key written by `connect` or `sync`.
pub const CONNECTION_KEYS: [&str; 4] = [OWNER_KEY, REPO_KEY, INSTALLATION_KEY, LAST_SYNC_KEY];

/// The orchestrator as wired by the CLI.
pub type CliOrchestrator = SyncOrchestrator<
    RetryingTracker<GitHubClient>,
    SqliteIssueStore,
    SqliteMappingStore,
    SqliteInstallationRepository,
    SqliteDeliveryLog,
>;

/// The stored repository binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Installation row holding sync state.
    pub installation_id: Uuid,
    /// Last successful manual sync.
    pub last_sync: Option<DateTime<Utc>>,
}

impl Connection {
    /// Read the binding; `None` unless owner, repo and installation id are all set.
    pub async fn load(settings: &dyn SettingsStore) -> Result<Option<Self>> {
        let (Some(owner), Some(repo), Some(id)) = (
            settings.get(OWNER_KEY).await?,
            settings.get(REPO_KEY).await?,
            settings.get(INSTALLATION_KEY).await?,
        ) else {
            return Ok(None);
        };
        let installation_id =
            Uuid::parse_str(&id).with_context(|| format!("stored {INSTALLATION_KEY} is not a UUID: {id}"))?;
        // An unreadable timestamp only loses the "last sync" display.
        let last_sync = settings
            .get(LAST_SYNC_KEY)
            .await?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc));
        Ok(Some(Self {
            owner,
            repo,
            installation_id,
            last_sync,
        }))
    }

    /// Store the binding and forget any previous sync time.
    pub async fn save(&self, settings: &dyn SettingsStore) -> DomainResult<()> {
        settings.set(OWNER_KEY, &self.owner).await?;
        settings.set(REPO_KEY, &self.repo).await?;
        settings.set(INSTALLATION_KEY, &self.installation_id.to_string()).await?;
        settings.delete(LAST_SYNC_KEY).await
    }

    /// Remember when a sync last succeeded.
    pub async fn record_sync(settings: &dyn SettingsStore, at: DateTime<Utc>) -> DomainResult<()> {
        settings.set(LAST_SYNC_KEY, &at.to_rfc3339()).await
    }

    /// Remove every connection key. Returns whether anything was stored.
    pub async fn clear(settings: &dyn SettingsStore) -> DomainResult<bool> {
        let mut had_any = false;
        for key in CONNECTION_KEYS {
            had_any |= settings.get(key).await?.is_some();
            settings.delete(key).await?;
        }
        Ok(had_any)
    }

    /// `owner/repo`.
    pub fn account_ref(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Configuration plus an open, migrated database.
pub struct CliContext {
    /// Effective configuration.
    pub config: Config,
    /// Migrated database.
    pub pool: SqlitePool,
}

impl CliContext {
    /// Load configuration from `path`, or from `.beadsync/` and the environment.
    pub fn load_config(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(path) => ConfigLoader::load_from_file(path),
            None => ConfigLoader::load(),
        }
    }

    /// Open and migrate the configured database.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = initialize_database(&config.database)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;
        Ok(Self { config, pool })
    }

    /// Settings store on the shared pool.
    pub fn settings(&self) -> SqliteSettingsStore {
        SqliteSettingsStore::new(self.pool.clone())
    }

    /// Installation repository on the shared pool.
    pub fn installations(&self) -> SqliteInstallationRepository {
        SqliteInstallationRepository::new(self.pool.clone())
    }

    /// The stored binding, if complete.
    pub async fn connection(&self) -> Result<Option<Connection>> {
        Connection::load(&self.settings()).await
    }

    /// The installation a stored connection points at.
    pub async fn installation(&self, connection: &Connection) -> Result<Installation> {
        self.installations()
            .get(connection.installation_id)
            .await?
            .ok_or_else(|| {
                anyhow!(
                    "installation {} for {} is missing; run `beadsync connect` again",
                    connection.installation_id,
                    connection.account_ref()
                )
            })
    }

    /// GitHub client for `installation`, wrapped in the configured retry policy.
    ///
    /// A stored, unexpired installation credential takes precedence over the
    /// token environment variable.
    pub fn tracker(&self, installation: &Installation) -> Result<RetryingTracker<GitHubClient>> {
        let github = &self.config.github;
        let client = match &installation.access_credential {
            Some(token) if !installation.credential_expired(Utc::now()) => {
                GitHubClient::with_config(github, token.clone(), &installation.owner, &installation.repo)
            }
            _ => GitHubClient::from_env(github, &installation.owner, &installation.repo).map_err(|e| anyhow!(e))?,
        };
        Ok(RetryingTracker::new(Arc::new(client), RetryPolicy::from_config(&self.config.retry)))
    }

    /// Orchestrator wired with the configured stores, retry policy, strategy and lease.
    pub fn orchestrator(&self, installation: Installation) -> Result<CliOrchestrator> {
        let tracker = Arc::new(self.tracker(&installation)?);
        let uses_defaults = installation.conventions.is_none();
        let mut orchestrator = SyncOrchestrator::new(
            installation,
            tracker,
            Arc::new(SqliteIssueStore::new(self.pool.clone())),
            Arc::new(SqliteMappingStore::new(self.pool.clone())),
            Arc::new(self.installations()),
            Arc::new(SqliteDeliveryLog::new(self.pool.clone())),
        )
        .with_default_strategy(self.config.sync.default_strategy)
        .with_lease(SyncLease::from_config(&self.config.sync));
        if uses_defaults {
            orchestrator = orchestrator.with_conventions(self.config.conventions.clone());
        }
        Ok(orchestrator)
    }
}
