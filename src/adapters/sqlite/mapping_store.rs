//! SQLite implementation of the MappingStore.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_datetime, is_unique_violation, number_from_sql, number_to_sql, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{IssueMapping, IssueMappingUpdate, NewIssueMapping};
use crate::domain::ports::MappingStore;

/// Local/external issue pairs.
#[derive(Clone)]
pub struct SqliteMappingStore {
    pool: SqlitePool,
}

impl SqliteMappingStore {
    /// Store backed by `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get_by_id(&self, id: Uuid) -> DomainResult<Option<IssueMapping>> {
        let row: Option<MappingRow> = sqlx::query_as(&format!("SELECT {MAPPING_COLUMNS} FROM issue_mappings WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }
}

const MAPPING_COLUMNS: &str = "id, installation_id, local_id, external_number, external_url, \
     last_synced_at, local_updated_at, external_updated_at";

#[async_trait]
impl MappingStore for SqliteMappingStore {
    async fn get_mapping(&self, installation_id: Uuid, local_id: &str) -> DomainResult<Option<IssueMapping>> {
        let row: Option<MappingRow> = sqlx::query_as(&format!(
            "SELECT {MAPPING_COLUMNS} FROM issue_mappings WHERE installation_id = ? AND local_id = ?"
        ))
        .bind(installation_id.to_string())
        .bind(local_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_mapping_by_external(
        &self,
        installation_id: Uuid,
        external_number: u64,
    ) -> DomainResult<Option<IssueMapping>> {
        let row: Option<MappingRow> = sqlx::query_as(&format!(
            "SELECT {MAPPING_COLUMNS} FROM issue_mappings WHERE installation_id = ? AND external_number = ?"
        ))
        .bind(installation_id.to_string())
        .bind(number_to_sql(external_number)?)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn create_mapping(&self, data: NewIssueMapping) -> DomainResult<IssueMapping> {
        let duplicate = || DomainError::DuplicateMapping {
            installation_id: data.installation_id,
            local_id: data.local_id.clone(),
            external_number: data.external_number,
        };

        if self.get_mapping(data.installation_id, &data.local_id).await?.is_some()
            || self
                .get_mapping_by_external(data.installation_id, data.external_number)
                .await?
                .is_some()
        {
            return Err(duplicate());
        }

        let mapping = data.clone().into_mapping(Utc::now());
        let inserted = sqlx::query(
            r"INSERT INTO issue_mappings (id, installation_id, local_id, external_number, external_url,
                                         last_synced_at, local_updated_at, external_updated_at)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(mapping.id.to_string())
        .bind(mapping.installation_id.to_string())
        .bind(&mapping.local_id)
        .bind(number_to_sql(mapping.external_number)?)
        .bind(&mapping.external_url)
        .bind(format_datetime(mapping.last_synced_at))
        .bind(format_datetime(mapping.local_updated_at))
        .bind(format_datetime(mapping.external_updated_at))
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(mapping),
            Err(err) if is_unique_violation(&err) => Err(duplicate()),
            Err(err) => Err(err.into()),
        }
    }

    async fn update_mapping(&self, id: Uuid, update: &IssueMappingUpdate) -> DomainResult<IssueMapping> {
        let mut mapping = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DomainError::MappingNotFound(id.to_string()))?;
        mapping.apply(update);

        let result = sqlx::query(
            r"UPDATE issue_mappings SET external_url = ?, last_synced_at = ?, local_updated_at = ?,
                     external_updated_at = ?
              WHERE id = ?",
        )
        .bind(&mapping.external_url)
        .bind(format_datetime(mapping.last_synced_at))
        .bind(format_datetime(mapping.local_updated_at))
        .bind(format_datetime(mapping.external_updated_at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::MappingNotFound(id.to_string()));
        }
        Ok(mapping)
    }

    async fn list_mappings(&self, installation_id: Uuid) -> DomainResult<Vec<IssueMapping>> {
        let rows: Vec<MappingRow> = sqlx::query_as(&format!(
            "SELECT {MAPPING_COLUMNS} FROM issue_mappings WHERE installation_id = ? ORDER BY external_number"
        ))
        .bind(installation_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct MappingRow {
    id: String,
    installation_id: String,
    local_id: String,
    external_number: i64,
    external_url: String,
    last_synced_at: String,
    local_updated_at: String,
    external_updated_at: String,
}

impl TryFrom<MappingRow> for IssueMapping {
    type Error = DomainError;

    fn try_from(row: MappingRow) -> Result<Self, Self::Error> {
        Ok(IssueMapping {
            id: parse_uuid(&row.id)?,
            installation_id: parse_uuid(&row.installation_id)?,
            local_id: row.local_id,
            external_number: number_from_sql(row.external_number)?,
            external_url: row.external_url,
            last_synced_at: parse_datetime(&row.last_synced_at)?,
            local_updated_at: parse_datetime(&row.local_updated_at)?,
            external_updated_at: parse_datetime(&row.external_updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteInstallationRepository};
    use crate::domain::models::Installation;
    use crate::domain::ports::InstallationRepository;
    use chrono::{DateTime, Duration};

    async fn setup() -> (SqliteMappingStore, SqliteInstallationRepository, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let installations = SqliteInstallationRepository::new(pool.clone());
        let installation = Installation::new("octo", "widgets");
        installations.create(&installation).await.unwrap();
        (SqliteMappingStore::new(pool), installations, installation.id)
    }

    fn new_mapping(installation_id: Uuid, local_id: &str, number: u64, at: DateTime<Utc>) -> NewIssueMapping {
        NewIssueMapping {
            installation_id,
            local_id: local_id.to_string(),
            external_number: number,
            external_url: format!("https://github.com/octo/widgets/issues/{number}"),
            local_updated_at: at,
            external_updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_both_keys() {
        let (store, _, installation_id) = setup().await;
        let created = store
            .create_mapping(new_mapping(installation_id, "bd-1", 7, Utc::now()))
            .await
            .unwrap();

        let by_local = store.get_mapping(installation_id, "bd-1").await.unwrap().unwrap();
        let by_external = store.get_mapping_by_external(installation_id, 7).await.unwrap().unwrap();
        assert_eq!(by_local.id, created.id);
        assert_eq!(by_external.id, created.id);
        assert!(store.get_mapping(installation_id, "bd-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_local_or_external_key_is_rejected() {
        let (store, _, installation_id) = setup().await;
        store
            .create_mapping(new_mapping(installation_id, "bd-1", 7, Utc::now()))
            .await
            .unwrap();

        let same_local = store.create_mapping(new_mapping(installation_id, "bd-1", 8, Utc::now())).await;
        assert!(matches!(same_local, Err(DomainError::DuplicateMapping { .. })));

        let same_external = store.create_mapping(new_mapping(installation_id, "bd-2", 7, Utc::now())).await;
        assert!(matches!(same_external, Err(DomainError::DuplicateMapping { external_number: 7, .. })));

        assert_eq!(store.list_mappings(installation_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_mapping_refreshes_timestamps() {
        let (store, _, installation_id) = setup().await;
        let at = Utc::now() - Duration::hours(1);
        let created = store
            .create_mapping(new_mapping(installation_id, "bd-1", 7, at))
            .await
            .unwrap();

        let later = Utc::now();
        let updated = store
            .update_mapping(created.id, &IssueMappingUpdate::synced(later, later, later))
            .await
            .unwrap();
        assert_eq!(updated.external_updated_at, later);

        let reloaded = store.get_mapping(installation_id, "bd-1").await.unwrap().unwrap();
        assert_eq!(reloaded.local_updated_at, later);
        assert_eq!(reloaded.last_synced_at, later);
        assert_eq!(reloaded.external_url, created.external_url);
    }

    #[tokio::test]
    async fn test_update_unknown_mapping_fails() {
        let (store, _, _) = setup().await;
        let result = store.update_mapping(Uuid::new_v4(), &IssueMappingUpdate::default()).await;
        assert!(matches!(result, Err(DomainError::MappingNotFound(_))));
    }

    #[tokio::test]
    async fn test_mappings_are_scoped_per_installation_and_cascade() {
        let (store, installations, installation_id) = setup().await;
        let other = Installation::new("octo", "gadgets");
        installations.create(&other).await.unwrap();

        store.create_mapping(new_mapping(installation_id, "bd-1", 7, Utc::now())).await.unwrap();
        store.create_mapping(new_mapping(other.id, "bd-1", 7, Utc::now())).await.unwrap();

        installations.delete(installation_id).await.unwrap();
        assert!(store.list_mappings(installation_id).await.unwrap().is_empty());
        assert_eq!(store.list_mappings(other.id).await.unwrap().len(), 1);
    }
}
