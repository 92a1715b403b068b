//! Per-pair steps shared by the orchestrator operations.
//!
//! Each step writes one side, then records the timestamps both stores
//! returned in the mapping so the next run sees the pair as unchanged.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ExternalIssue, ExternalIssueUpdate, ExternalState, IssueMapping, IssueMappingUpdate, LocalIssue, NewIssueMapping,
    SyncResult,
};
use crate::domain::ports::{DeliveryLog, InstallationRepository, IssueTracker, LocalIssueStore, MappingStore};
use crate::services::issue_converter::{external_ref, localize_references, to_external, to_local};

use super::SyncOrchestrator;

/// What happened to one issue pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum PairOutcome {
    Created(String),
    Updated(String),
    Skipped(String),
    Orphaned(String),
}

impl PairOutcome {
    pub(super) fn record(self, result: &mut SyncResult) {
        match self {
            Self::Created(id) => result.created.push(id),
            Self::Updated(id) => result.updated.push(id),
            Self::Skipped(id) => result.skipped.push(id),
            Self::Orphaned(id) => result.orphaned.push(id),
        }
    }
}

/// Id of a stored local issue, or a validation error for an unsaved one.
pub(super) fn require_id(issue: &LocalIssue) -> DomainResult<&str> {
    issue
        .id
        .as_deref()
        .ok_or_else(|| DomainError::ValidationFailed(format!("issue '{}' has no id", issue.title)))
}

impl<T, S, M, I, D> SyncOrchestrator<T, S, M, I, D>
where
    T: IssueTracker + 'static,
    S: LocalIssueStore + 'static,
    M: MappingStore + 'static,
    I: InstallationRepository + 'static,
    D: DeliveryLog + 'static,
{
    /// Local id → bound external number, for rendering references.
    pub(super) async fn external_numbers(&self) -> DomainResult<HashMap<String, u64>> {
        Ok(self
            .mappings
            .list_mappings(self.installation.id)
            .await?
            .into_iter()
            .map(|m| (m.local_id, m.external_number))
            .collect())
    }

    /// Bound external number → local id, for localizing references.
    pub(super) async fn local_ids(&self) -> DomainResult<HashMap<u64, String>> {
        Ok(self
            .mappings
            .list_mappings(self.installation.id)
            .await?
            .into_iter()
            .map(|m| (m.external_number, m.local_id))
            .collect())
    }

    /// Create `local` on the tracker and bind the pair.
    pub(super) async fn create_external_pair(
        &self,
        local: &LocalIssue,
        numbers: &HashMap<String, u64>,
    ) -> DomainResult<IssueMapping> {
        let local_id = require_id(local)?;
        let payload = to_external(local, &self.mapper, Some(numbers));
        let created = self.tracker.create_issue(&payload).await?;

        let mut mapping = self
            .mappings
            .create_mapping(NewIssueMapping {
                installation_id: self.installation.id,
                local_id: local_id.to_string(),
                external_number: created.number,
                external_url: created.html_url.clone(),
                local_updated_at: local.updated_at,
                external_updated_at: created.updated_at,
            })
            .await?;
        debug!(local_id, external_number = created.number, "created external issue");

        // Link the local issue back; the write bumps its timestamp, which
        // must not read as a local change on the next run.
        let reference = external_ref(&self.installation.owner, &self.installation.repo, created.number);
        if local.external_ref.as_deref() != Some(reference.as_str()) {
            let mut linked = local.clone();
            linked.external_ref = Some(reference);
            let stored = self.store.update(&linked).await?;
            mapping = self
                .mappings
                .update_mapping(
                    mapping.id,
                    &IssueMappingUpdate {
                        local_updated_at: Some(stored.updated_at),
                        ..Default::default()
                    },
                )
                .await?;
        }

        if payload.state == ExternalState::Closed && created.state != ExternalState::Closed {
            mapping = self.close_created(mapping).await?;
        }
        Ok(mapping)
    }

    /// Close a freshly bound external issue. When the close fails the local
    /// side stays marked as changed, so the next push sends the state again
    /// instead of creating another issue.
    async fn close_created(&self, mapping: IssueMapping) -> DomainResult<IssueMapping> {
        let close = ExternalIssueUpdate {
            state: Some(ExternalState::Closed),
            ..Default::default()
        };
        match self.tracker.update_issue(mapping.external_number, &close).await {
            Ok(closed) => Ok(self
                .mappings
                .update_mapping(
                    mapping.id,
                    &IssueMappingUpdate {
                        external_updated_at: Some(closed.updated_at),
                        ..Default::default()
                    },
                )
                .await?),
            Err(e) => {
                warn!(
                    local_id = %mapping.local_id,
                    external_number = mapping.external_number,
                    error = %e,
                    "closing created external issue failed"
                );
                self.mappings
                    .update_mapping(
                        mapping.id,
                        &IssueMappingUpdate {
                            local_updated_at: Some(DateTime::<Utc>::default()),
                            ..Default::default()
                        },
                    )
                    .await?;
                Err(e.into())
            }
        }
    }

    /// Overwrite the external side of a bound pair with `local`.
    pub(super) async fn overwrite_external(
        &self,
        mapping: &IssueMapping,
        local: &LocalIssue,
        numbers: &HashMap<String, u64>,
    ) -> DomainResult<ExternalIssue> {
        let payload = to_external(local, &self.mapper, Some(numbers));
        let updated = self
            .tracker
            .update_issue(mapping.external_number, &ExternalIssueUpdate::from(payload))
            .await?;

        let mut refresh = IssueMappingUpdate::synced(Utc::now(), local.updated_at, updated.updated_at);
        if updated.html_url != mapping.external_url {
            refresh.external_url = Some(updated.html_url.clone());
        }
        self.mappings.update_mapping(mapping.id, &refresh).await?;
        debug!(
            local_id = %mapping.local_id,
            external_number = mapping.external_number,
            "updated external issue"
        );
        Ok(updated)
    }

    /// Create `external` locally and bind the pair. Returns the new local id.
    pub(super) async fn create_local_pair(
        &self,
        external: &ExternalIssue,
        local_ids: &HashMap<u64, String>,
    ) -> DomainResult<String> {
        let mut converted = to_local(external, &self.mapper, &self.installation.owner, &self.installation.repo);
        localize_references(&mut converted, local_ids);
        let stored = self.store.create(&converted).await?;
        let local_id = require_id(&stored)?.to_string();

        let bound = self
            .mappings
            .create_mapping(NewIssueMapping {
                installation_id: self.installation.id,
                local_id: local_id.clone(),
                external_number: external.number,
                external_url: external.html_url.clone(),
                local_updated_at: stored.updated_at,
                external_updated_at: external.updated_at,
            })
            .await;
        if let Err(e) = bound {
            // Every local issue created from an external one is bound.
            self.store.delete(&local_id).await?;
            warn!(local_id = %local_id, external_number = external.number, error = %e, "discarded unbound local issue");
            return Err(e);
        }
        debug!(local_id = %local_id, external_number = external.number, "created local issue");
        Ok(local_id)
    }

    /// Overwrite the local side of a bound pair with `external`, keeping
    /// the local identity.
    pub(super) async fn overwrite_local(
        &self,
        mapping: &IssueMapping,
        existing: &LocalIssue,
        external: &ExternalIssue,
        local_ids: &HashMap<u64, String>,
    ) -> DomainResult<LocalIssue> {
        let mut converted = to_local(external, &self.mapper, &self.installation.owner, &self.installation.repo);
        localize_references(&mut converted, local_ids);
        converted.id.clone_from(&existing.id);
        converted.created_at = existing.created_at;
        let stored = self.store.update(&converted).await?;

        let mut refresh = IssueMappingUpdate::synced(Utc::now(), stored.updated_at, external.updated_at);
        if external.html_url != mapping.external_url {
            refresh.external_url = Some(external.html_url.clone());
        }
        self.mappings.update_mapping(mapping.id, &refresh).await?;
        debug!(
            local_id = %mapping.local_id,
            external_number = mapping.external_number,
            "updated local issue"
        );
        Ok(stored)
    }

    /// Pull one external issue: create it when unbound, overwrite the local
    /// side when bound, report an orphan when the local side is gone.
    pub(super) async fn pull_one(
        &self,
        external: &ExternalIssue,
        local_ids: &mut HashMap<u64, String>,
    ) -> DomainResult<PairOutcome> {
        match self
            .mappings
            .get_mapping_by_external(self.installation.id, external.number)
            .await?
        {
            None => {
                let local_id = self.create_local_pair(external, local_ids).await?;
                local_ids.insert(external.number, local_id.clone());
                Ok(PairOutcome::Created(local_id))
            }
            Some(mapping) => match self.store.get(&mapping.local_id).await? {
                None => Ok(PairOutcome::Orphaned(mapping.local_id)),
                Some(existing) => {
                    self.overwrite_local(&mapping, &existing, external, local_ids).await?;
                    Ok(PairOutcome::Updated(mapping.local_id))
                }
            },
        }
    }
}
