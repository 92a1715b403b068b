//! SQLite implementation of the InstallationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ConventionConfig, Installation, SyncState, SyncStatus};
use crate::domain::ports::InstallationRepository;

/// Installations and their sync state.
#[derive(Clone)]
pub struct SqliteInstallationRepository {
    pool: SqlitePool,
}

impl SqliteInstallationRepository {
    /// Repository backed by `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const INSTALLATION_COLUMNS: &str =
    "id, owner, repo, access_credential, credential_expires_at, conventions, created_at";

#[async_trait]
impl InstallationRepository for SqliteInstallationRepository {
    async fn create(&self, installation: &Installation) -> DomainResult<()> {
        let conventions_json = installation
            .conventions
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"INSERT INTO installations (id, owner, repo, access_credential, credential_expires_at, conventions, created_at)
              VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(installation.id.to_string())
        .bind(&installation.owner)
        .bind(&installation.repo)
        .bind(&installation.access_credential)
        .bind(installation.credential_expires_at.map(format_datetime))
        .bind(conventions_json)
        .bind(format_datetime(installation.created_at))
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO sync_states (installation_id, status, error_count) VALUES (?, 'idle', 0)")
            .bind(installation.id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Installation>> {
        let row: Option<InstallationRow> =
            sqlx::query_as(&format!("SELECT {INSTALLATION_COLUMNS} FROM installations WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_account(&self, owner: &str, repo: &str) -> DomainResult<Option<Installation>> {
        let row: Option<InstallationRow> = sqlx::query_as(&format!(
            "SELECT {INSTALLATION_COLUMNS} FROM installations WHERE owner = ? AND repo = ?"
        ))
        .bind(owner)
        .bind(repo)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update_credential(&self, installation: &Installation) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE installations SET access_credential = ?, credential_expires_at = ? WHERE id = ?",
        )
        .bind(&installation.access_credential)
        .bind(installation.credential_expires_at.map(format_datetime))
        .bind(installation.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::InstallationNotFound(installation.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM installations WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::InstallationNotFound(id));
        }
        Ok(())
    }

    async fn get_sync_state(&self, installation_id: Uuid) -> DomainResult<Option<SyncState>> {
        let row: Option<SyncStateRow> = sqlx::query_as(
            r"SELECT installation_id, last_sync_at, last_external_event_cursor, last_local_commit_cursor,
                     status, error_message, error_count
              FROM sync_states WHERE installation_id = ?",
        )
        .bind(installation_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn save_sync_state(&self, state: &SyncState) -> DomainResult<()> {
        sqlx::query(
            r"INSERT INTO sync_states (installation_id, last_sync_at, last_external_event_cursor,
                                      last_local_commit_cursor, status, error_message, error_count)
              VALUES (?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(installation_id) DO UPDATE SET
                  last_sync_at = excluded.last_sync_at,
                  last_external_event_cursor = excluded.last_external_event_cursor,
                  last_local_commit_cursor = excluded.last_local_commit_cursor,
                  status = excluded.status,
                  error_message = excluded.error_message,
                  error_count = excluded.error_count,
                  lease_expires_at = CASE WHEN excluded.status = 'syncing' THEN sync_states.lease_expires_at END",
        )
        .bind(state.installation_id.to_string())
        .bind(state.last_sync_at.map(format_datetime))
        .bind(&state.last_external_event_cursor)
        .bind(&state.last_local_commit_cursor)
        .bind(state.status.as_str())
        .bind(&state.error_message)
        .bind(i64::from(state.error_count))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn try_begin_sync(
        &self,
        installation_id: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result = sqlx::query(
            r"INSERT INTO sync_states (installation_id, status, error_count, lease_expires_at)
              VALUES (?, 'syncing', 0, ?)
              ON CONFLICT(installation_id) DO UPDATE SET
                  status = 'syncing',
                  lease_expires_at = excluded.lease_expires_at
              WHERE sync_states.status != 'syncing'
                 OR sync_states.lease_expires_at IS NULL
                 OR sync_states.lease_expires_at <= ?",
        )
        .bind(installation_id.to_string())
        .bind(format_datetime(lease_until))
        .bind(format_datetime(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(sqlx::FromRow)]
struct InstallationRow {
    id: String,
    owner: String,
    repo: String,
    access_credential: Option<String>,
    credential_expires_at: Option<String>,
    conventions: Option<String>,
    created_at: String,
}

impl TryFrom<InstallationRow> for Installation {
    type Error = DomainError;

    fn try_from(row: InstallationRow) -> Result<Self, Self::Error> {
        let conventions: Option<ConventionConfig> =
            row.conventions.map(|s| serde_json::from_str(&s)).transpose()?;

        Ok(Installation {
            id: parse_uuid(&row.id)?,
            owner: row.owner,
            repo: row.repo,
            access_credential: row.access_credential,
            credential_expires_at: parse_optional_datetime(row.credential_expires_at)?,
            conventions,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SyncStateRow {
    installation_id: String,
    last_sync_at: Option<String>,
    last_external_event_cursor: Option<String>,
    last_local_commit_cursor: Option<String>,
    status: String,
    error_message: Option<String>,
    error_count: i64,
}

impl TryFrom<SyncStateRow> for SyncState {
    type Error = DomainError;

    fn try_from(row: SyncStateRow) -> Result<Self, Self::Error> {
        let status = SyncStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid sync status: {}", row.status)))?;

        Ok(SyncState {
            installation_id: parse_uuid(&row.installation_id)?,
            last_sync_at: parse_optional_datetime(row.last_sync_at)?,
            last_external_event_cursor: row.last_external_event_cursor,
            last_local_commit_cursor: row.last_local_commit_cursor,
            status,
            error_message: row.error_message,
            error_count: u32::try_from(row.error_count).unwrap_or(u32::MAX),
        })
    }
}
