//! SQLite database adapters for beadsync.

pub mod connection;
pub mod delivery_log;
pub mod installation_repository;
pub mod issue_store;
pub mod mapping_store;
pub mod migrations;
pub mod settings_store;

pub use connection::{open_memory_pool, open_pool, ConnectionError, PoolConfig};
pub use delivery_log::SqliteDeliveryLog;
pub use installation_repository::SqliteInstallationRepository;
pub use issue_store::SqliteIssueStore;
pub use mapping_store::SqliteMappingStore;
pub use migrations::{Migration, MigrationError, Migrator, MIGRATIONS};
pub use settings_store::SqliteSettingsStore;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::DatabaseConfig;

fn unreadable(kind: &str, value: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::SerializationError(format!("stored {kind} '{value}' is unreadable: {err}"))
}

/// Ids are stored as hyphenated UUID text.
pub fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| unreadable("id", s, e))
}

/// Timestamps are stored as RFC 3339 text in UTC.
pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| unreadable("timestamp", s, e))
}

/// Nullable timestamp column.
pub fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_datetime).transpose()
}

/// JSON list and object columns; NULL reads as the empty value.
pub fn parse_json_or_default<T: serde::de::DeserializeOwned + Default>(s: Option<String>) -> DomainResult<T> {
    match s.as_deref() {
        None => Ok(T::default()),
        Some(text) => serde_json::from_str(text).map_err(|e| unreadable("JSON", text, e)),
    }
}

/// Fixed-width, lossless timestamp text so stored values order lexically.
pub fn format_datetime(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// External issue numbers are stored as SQLite integers.
pub fn number_to_sql(number: u64) -> DomainResult<i64> {
    i64::try_from(number)
        .map_err(|_| DomainError::ValidationFailed(format!("issue number {number} is out of range")))
}

/// Inverse of [`number_to_sql`].
pub fn number_from_sql(value: i64) -> DomainResult<u64> {
    u64::try_from(value)
        .map_err(|_| DomainError::SerializationError(format!("negative issue number {value}")))
}

/// Whether a query failed on a UNIQUE or PRIMARY KEY constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// Failure to open or migrate the database.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Opening failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// Migrating failed.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Open the configured database file and bring its schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
    let pool = open_pool(Path::new(&config.path), &PoolConfig::from(config)).await?;
    Migrator::new(pool.clone()).run(MIGRATIONS).await?;
    Ok(pool)
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = open_memory_pool().await?;
    Migrator::new(pool.clone()).run(MIGRATIONS).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_datetimes_order_lexically() {
        let early: DateTime<Utc> = "2025-01-01T00:00:00Z".parse().unwrap();
        let late: DateTime<Utc> = "2025-01-01T00:00:00.5Z".parse().unwrap();
        assert!(format_datetime(early) < format_datetime(late));
        assert_eq!(parse_datetime(&format_datetime(late)).unwrap(), late);
    }

    #[test]
    fn test_unreadable_values_name_the_value() {
        let err = parse_uuid("nope").unwrap_err();
        assert!(err.to_string().contains("'nope'"));
        assert!(parse_optional_datetime(None).unwrap().is_none());
        assert!(parse_optional_datetime(Some("yesterday".into())).is_err());
        let empty: Vec<String> = parse_json_or_default(None).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_number_conversion_bounds() {
        assert_eq!(number_to_sql(42).unwrap(), 42);
        assert!(number_to_sql(u64::MAX).is_err());
        assert!(number_from_sql(-1).is_err());
    }
}
