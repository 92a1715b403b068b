//! Installation and sync state repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Installation, SyncState};

/// Repository interface for installations and their sync state.
#[async_trait]
pub trait InstallationRepository: Send + Sync {
    /// Create an installation together with an `idle` sync state.
    async fn create(&self, installation: &Installation) -> DomainResult<()>;

    /// Installation by id.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Installation>>;

    /// Installation bound to `owner/repo`.
    async fn find_by_account(&self, owner: &str, repo: &str) -> DomainResult<Option<Installation>>;

    /// Replace the stored credential after an out-of-band refresh.
    async fn update_credential(&self, installation: &Installation) -> DomainResult<()>;

    /// Delete an installation, cascading to its sync state, mappings and
    /// delivery log.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// Sync bookkeeping; `None` before the first unit.
    async fn get_sync_state(&self, installation_id: Uuid) -> DomainResult<Option<SyncState>>;

    /// Save the sync state. Leaving `syncing` releases the sync lease.
    async fn save_sync_state(&self, state: &SyncState) -> DomainResult<()>;

    /// Atomically move the sync state to `syncing` under a lease held until
    /// `lease_until`. Returns `false` while another unit, in this process or
    /// another, holds a lease that has not expired at `now`.
    async fn try_begin_sync(
        &self,
        installation_id: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> DomainResult<bool>;
}
