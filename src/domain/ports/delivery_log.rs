//! Webhook delivery deduplication port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;

/// Durable record of processed webhook delivery ids.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    /// Record a delivery. Returns `false` when it had already been recorded.
    async fn record(&self, installation_id: Uuid, delivery_id: &str) -> DomainResult<bool>;

    /// Forget deliveries received before `cutoff`; returns how many were removed.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> DomainResult<u64>;
}
