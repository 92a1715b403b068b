//! Cross-process exclusion of sync units.
//!
//! Every orchestrator here shares one database, the way `serve` and a
//! manual `sync` share the state file.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beadsync::adapters::sqlite::SqliteMappingStore;
use beadsync::domain::errors::{DomainError, DomainResult};
use beadsync::domain::models::{IssueMapping, IssueMappingUpdate, NewIssueMapping, SyncStatus};
use beadsync::domain::ports::{InstallationRepository, MappingStore};
use beadsync::services::{SyncLease, SyncOrchestrator};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use common::{external_issue, issue_event, Harness};

fn no_wait() -> SyncLease {
    SyncLease {
        timeout: Duration::from_secs(900),
        wait: Duration::ZERO,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_units_from_two_orchestrators_do_not_duplicate() {
    for round in 0..10 {
        let h = Harness::new().await;
        let number = round + 1;
        h.tracker
            .insert_issue(external_issue(number, "Raced", &[], None))
            .await;
        let syncing = h.orchestrator();
        let serving = h.orchestrator();
        let event = issue_event(&format!("race-{round}"), "opened", &external_issue(number, "Raced", &[], None));

        let cancel = CancellationToken::new();
        let (synced, delivered) = tokio::join!(syncing.sync(None, &cancel), serving.process_webhook_event(&event));
        synced.unwrap();
        delivered.unwrap();

        assert_eq!(h.local_issues().await.len(), 1, "round {round}");
        assert_eq!(h.all_mappings().await.len(), 1, "round {round}");
        let state = h.installations.get_sync_state(h.installation.id).await.unwrap().unwrap();
        assert_ne!(state.status, SyncStatus::Syncing);
    }
}

#[tokio::test]
async fn test_held_lease_defers_webhook_without_consuming_delivery() {
    let h = Harness::new().await;
    let now = Utc::now();
    assert!(h
        .installations
        .try_begin_sync(h.installation.id, now, now + chrono::Duration::minutes(15))
        .await
        .unwrap());

    let orchestrator = h.orchestrator().with_lease(no_wait());
    let event = issue_event("held-1", "opened", &external_issue(1, "Later", &[], None));
    let err = orchestrator.process_webhook_event(&event).await.unwrap_err();
    assert!(matches!(err, DomainError::SyncInProgress(id) if id == h.installation.id));
    assert!(h.local_issues().await.is_empty());

    let mut released = h.installations.get_sync_state(h.installation.id).await.unwrap().unwrap();
    released.finish_ok(Utc::now());
    h.installations.save_sync_state(&released).await.unwrap();

    let result = orchestrator.process_webhook_event(&event).await.unwrap();
    assert_eq!(result.created.len(), 1);
}

#[tokio::test]
async fn test_held_lease_refuses_manual_sync() {
    let h = Harness::new().await;
    let now = Utc::now();
    h.installations
        .try_begin_sync(h.installation.id, now, now + chrono::Duration::minutes(15))
        .await
        .unwrap();

    let result = h
        .orchestrator()
        .with_lease(no_wait())
        .sync(None, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(DomainError::SyncInProgress(_))));

    let state = h.installations.get_sync_state(h.installation.id).await.unwrap().unwrap();
    assert_eq!(state.status, SyncStatus::Syncing);
    assert_eq!(state.error_count, 0);
}

#[tokio::test]
async fn test_stale_lease_is_taken_over() {
    let h = Harness::new().await;
    let crashed_at = Utc::now() - chrono::Duration::hours(1);
    h.installations
        .try_begin_sync(h.installation.id, crashed_at, crashed_at + chrono::Duration::minutes(15))
        .await
        .unwrap();

    let result = h
        .orchestrator()
        .with_lease(no_wait())
        .sync(None, &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.is_empty());

    let state = h.installations.get_sync_state(h.installation.id).await.unwrap().unwrap();
    assert_eq!(state.status, SyncStatus::Idle);
    assert!(state.last_sync_at.is_some());
}

#[tokio::test]
async fn test_duplicate_webhook_releases_the_lease() {
    let h = Harness::new().await;
    let orchestrator = h.orchestrator();
    let event = issue_event("twice", "opened", &external_issue(3, "Once", &[], None));

    orchestrator.process_webhook_event(&event).await.unwrap();
    assert!(orchestrator.process_webhook_event(&event).await.unwrap().is_empty());

    let state = h.installations.get_sync_state(h.installation.id).await.unwrap().unwrap();
    assert_eq!(state.status, SyncStatus::Idle);
    let now = Utc::now();
    assert!(h
        .installations
        .try_begin_sync(h.installation.id, now, now + chrono::Duration::minutes(1))
        .await
        .unwrap());
}

/// Mapping store that loses every create to a concurrent writer.
struct LosingMappings {
    inner: Arc<SqliteMappingStore>,
}

#[async_trait]
impl MappingStore for LosingMappings {
    async fn get_mapping(&self, installation_id: Uuid, local_id: &str) -> DomainResult<Option<IssueMapping>> {
        self.inner.get_mapping(installation_id, local_id).await
    }

    async fn get_mapping_by_external(
        &self,
        installation_id: Uuid,
        external_number: u64,
    ) -> DomainResult<Option<IssueMapping>> {
        self.inner.get_mapping_by_external(installation_id, external_number).await
    }

    async fn create_mapping(&self, data: NewIssueMapping) -> DomainResult<IssueMapping> {
        Err(DomainError::DuplicateMapping {
            installation_id: data.installation_id,
            local_id: data.local_id,
            external_number: data.external_number,
        })
    }

    async fn update_mapping(&self, id: Uuid, update: &IssueMappingUpdate) -> DomainResult<IssueMapping> {
        self.inner.update_mapping(id, update).await
    }

    async fn list_mappings(&self, installation_id: Uuid) -> DomainResult<Vec<IssueMapping>> {
        self.inner.list_mappings(installation_id).await
    }
}

#[tokio::test]
async fn test_local_copy_is_discarded_when_binding_fails() {
    let h = Harness::new().await;
    let orchestrator = SyncOrchestrator::new(
        h.installation.clone(),
        h.tracker.clone(),
        h.store.clone(),
        Arc::new(LosingMappings {
            inner: h.mappings.clone(),
        }),
        h.installations.clone(),
        h.deliveries.clone(),
    );

    let event = issue_event("lost", "opened", &external_issue(5, "Bound elsewhere", &[], None));
    let result = orchestrator.process_webhook_event(&event).await.unwrap();

    assert_eq!(result.errors.len(), 1);
    assert!(result.created.is_empty());
    assert!(h.local_issues().await.is_empty());
}
