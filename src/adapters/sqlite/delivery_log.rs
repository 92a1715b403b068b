//! SQLite implementation of the DeliveryLog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::format_datetime;
use crate::domain::errors::DomainResult;
use crate::domain::ports::DeliveryLog;

/// Processed webhook deliveries, keyed by delivery id.
#[derive(Clone)]
pub struct SqliteDeliveryLog {
    pool: SqlitePool,
}

impl SqliteDeliveryLog {
    /// Log backed by `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryLog for SqliteDeliveryLog {
    async fn record(&self, installation_id: Uuid, delivery_id: &str) -> DomainResult<bool> {
        let result = sqlx::query(
            r"INSERT INTO webhook_deliveries (installation_id, delivery_id, received_at)
              VALUES (?, ?, ?)
              ON CONFLICT(installation_id, delivery_id) DO NOTHING",
        )
        .bind(installation_id.to_string())
        .bind(delivery_id)
        .bind(format_datetime(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM webhook_deliveries WHERE received_at < ?")
            .bind(format_datetime(cutoff))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteInstallationRepository};
    use crate::domain::models::Installation;
    use crate::domain::ports::InstallationRepository;
    use chrono::Duration;

    async fn setup() -> (SqliteDeliveryLog, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let installation = Installation::new("o", "r");
        SqliteInstallationRepository::new(pool.clone())
            .create(&installation)
            .await
            .unwrap();
        (SqliteDeliveryLog::new(pool), installation.id)
    }

    #[tokio::test]
    async fn test_record_reports_first_sighting_only() {
        let (log, installation_id) = setup().await;
        assert!(log.record(installation_id, "abc-123").await.unwrap());
        assert!(!log.record(installation_id, "abc-123").await.unwrap());
        assert!(log.record(installation_id, "abc-124").await.unwrap());
    }

    #[tokio::test]
    async fn test_prune_removes_only_older_deliveries() {
        let (log, installation_id) = setup().await;
        log.record(installation_id, "old").await.unwrap();

        assert_eq!(log.prune_older_than(Utc::now() - Duration::hours(1)).await.unwrap(), 0);
        assert_eq!(log.prune_older_than(Utc::now() + Duration::seconds(1)).await.unwrap(), 1);
        assert!(log.record(installation_id, "old").await.unwrap());
    }
}
