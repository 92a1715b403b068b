//! Sync Orchestrator - keeps one installation's local store and external
//! tracker consistent.
//!
//! The orchestrator is a thin coordinator over four operations:
//!
//! - **webhook**: Inbound webhook events with delivery deduplication
//! - **push_pull**: One-directional push of local issues and pull of external ones
//! - **reconcile**: Full bidirectional sync with conflict resolution
//! - **helpers**: Per-pair create/overwrite steps shared by the operations
//!
//! Every operation is a serialized unit of work for the installation: it
//! holds the unit lock for its whole duration and moves the installation's
//! [`SyncState`] through `syncing` to `idle` or `error`. Entering `syncing`
//! takes a lease in the database, so units started by different processes
//! (`serve` and a manual `sync`) never overlap either.

mod helpers;
mod push_pull;
mod reconcile;
mod webhook;

pub use push_pull::PULL_ERROR_KEY;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ConflictStrategy, ConventionConfig, Installation, SyncConfig, SyncResult, SyncState};
use crate::domain::ports::{DeliveryLog, InstallationRepository, IssueTracker, LocalIssueStore, MappingStore};
use crate::services::convention_mapper::ConventionMapper;

/// Interval between attempts to take a held lease.
const LEASE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bounds of the cross-process sync lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLease {
    /// Lifetime of a lease; an older one is considered abandoned.
    pub timeout: Duration,
    /// How long a unit waits for a held lease before giving up.
    pub wait: Duration,
}

impl Default for SyncLease {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl SyncLease {
    /// Lease timings from the `sync` config section.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.lease_timeout_secs.max(1)),
            wait: Duration::from_secs(config.lease_wait_secs),
        }
    }
}

/// Per-installation sync engine.
pub struct SyncOrchestrator<T, S, M, I, D>
where
    T: IssueTracker + 'static,
    S: LocalIssueStore + 'static,
    M: MappingStore + 'static,
    I: InstallationRepository + 'static,
    D: DeliveryLog + 'static,
{
    pub(super) tracker: Arc<T>,
    pub(super) store: Arc<S>,
    pub(super) mappings: Arc<M>,
    pub(super) installations: Arc<I>,
    pub(super) deliveries: Arc<D>,
    pub(super) installation: Installation,
    pub(super) mapper: ConventionMapper,
    pub(super) default_strategy: ConflictStrategy,
    lease: SyncLease,
    unit_lock: Mutex<()>,
}

impl<T, S, M, I, D> SyncOrchestrator<T, S, M, I, D>
where
    T: IssueTracker + 'static,
    S: LocalIssueStore + 'static,
    M: MappingStore + 'static,
    I: InstallationRepository + 'static,
    D: DeliveryLog + 'static,
{
    /// Create an orchestrator for `installation`.
    ///
    /// The installation's own conventions are used when it has any, the
    /// built-in defaults otherwise.
    pub fn new(
        installation: Installation,
        tracker: Arc<T>,
        store: Arc<S>,
        mappings: Arc<M>,
        installations: Arc<I>,
        deliveries: Arc<D>,
    ) -> Self {
        let mapper = ConventionMapper::new(installation.conventions.clone().unwrap_or_default());
        Self {
            tracker,
            store,
            mappings,
            installations,
            deliveries,
            installation,
            mapper,
            default_strategy: ConflictStrategy::default(),
            lease: SyncLease::default(),
            unit_lock: Mutex::new(()),
        }
    }

    /// Replace the convention set.
    pub fn with_conventions(mut self, conventions: ConventionConfig) -> Self {
        self.mapper = ConventionMapper::new(conventions);
        self
    }

    /// Strategy used by [`Self::sync`] when the caller passes none.
    pub fn with_default_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    /// Replace the lease timings.
    pub fn with_lease(mut self, lease: SyncLease) -> Self {
        self.lease = lease;
        self
    }

    /// The installation this orchestrator syncs.
    pub fn installation(&self) -> &Installation {
        &self.installation
    }

    /// Conventions in effect.
    pub fn mapper(&self) -> &ConventionMapper {
        &self.mapper
    }

    /// Mark the start of a unit of work, waiting up to the lease wait for
    /// a unit held elsewhere to finish.
    pub(super) async fn begin_unit(&self) -> DomainResult<SyncState> {
        let ttl = chrono::Duration::from_std(self.lease.timeout)
            .map_err(|e| DomainError::ValidationFailed(format!("invalid lease timeout: {e}")))?;
        let deadline = tokio::time::Instant::now() + self.lease.wait;
        loop {
            let now = Utc::now();
            let until = now
                .checked_add_signed(ttl)
                .ok_or_else(|| DomainError::ValidationFailed("lease timeout out of range".to_string()))?;
            if self.installations.try_begin_sync(self.installation.id, now, until).await? {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DomainError::SyncInProgress(self.installation.id));
            }
            tokio::time::sleep(LEASE_POLL_INTERVAL).await;
        }

        let mut state = self
            .installations
            .get_sync_state(self.installation.id)
            .await?
            .unwrap_or_else(|| SyncState::new(self.installation.id));
        state.begin();
        debug!(installation_id = %self.installation.id, "sync unit started");
        Ok(state)
    }

    /// Release the lease of a unit that did no work.
    pub(super) async fn abandon_unit(&self, mut state: SyncState) -> DomainResult<()> {
        state.abandon();
        self.installations.save_sync_state(&state).await
    }

    /// Record the outcome of a unit of work.
    ///
    /// The unit fails when it aborted or collected any item error.
    pub(super) async fn finish_unit(&self, mut state: SyncState, outcome: &DomainResult<SyncResult>) -> DomainResult<()> {
        match outcome {
            Ok(result) => match result.errors.first() {
                None => state.finish_ok(Utc::now()),
                Some(first) => state.finish_err(format!(
                    "{} item error(s); first {}: {}",
                    result.errors.len(),
                    first.id,
                    first.message
                )),
            },
            Err(e) => state.finish_err(e.to_string()),
        }
        if let Some(message) = &state.error_message {
            warn!(
                installation_id = %self.installation.id,
                error_count = state.error_count,
                error = %message,
                "sync unit finished with errors"
            );
        }
        self.installations.save_sync_state(&state).await
    }
}
