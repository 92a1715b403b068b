//! One-directional push and pull.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{IssueStateFilter, ItemError, LocalIssue, SyncResult};
use crate::domain::ports::{DeliveryLog, InstallationRepository, IssueTracker, LocalIssueStore, MappingStore};

use super::helpers::{require_id, PairOutcome};
use super::SyncOrchestrator;

/// Error key used when the external listing itself fails.
pub const PULL_ERROR_KEY: &str = "pull";

impl<T, S, M, I, D> SyncOrchestrator<T, S, M, I, D>
where
    T: IssueTracker + 'static,
    S: LocalIssueStore + 'static,
    M: MappingStore + 'static,
    I: InstallationRepository + 'static,
    D: DeliveryLog + 'static,
{
    /// Push local issues to the tracker: unbound issues are created,
    /// bound ones overwritten. A failing issue does not stop the others.
    pub async fn push_to_github(&self, issues: &[LocalIssue], cancel: &CancellationToken) -> DomainResult<SyncResult> {
        let _unit = self.unit_lock.lock().await;
        let state = self.begin_unit().await?;
        let outcome = self.push_issues(issues, cancel).await;
        self.finish_unit(state, &outcome).await?;
        outcome
    }

    /// Pull every external issue into the local store, creating or
    /// overwriting by mapping presence.
    pub async fn pull_from_github(&self, cancel: &CancellationToken) -> DomainResult<SyncResult> {
        let _unit = self.unit_lock.lock().await;
        let state = self.begin_unit().await?;
        let outcome = self.pull_issues(cancel).await;
        self.finish_unit(state, &outcome).await?;
        outcome
    }

    async fn push_issues(&self, issues: &[LocalIssue], cancel: &CancellationToken) -> DomainResult<SyncResult> {
        let mut result = SyncResult::default();
        let mut numbers = self.external_numbers().await?;

        for issue in issues {
            if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }
            match self.push_one(issue, &mut numbers).await {
                Ok(outcome) => outcome.record(&mut result),
                Err(e) => {
                    warn!(local_id = issue.display_id(), error = %e, "push failed");
                    result.record_error(issue.display_id(), &e);
                }
            }
        }

        info!(
            installation_id = %self.installation.id,
            created = result.created.len(),
            updated = result.updated.len(),
            errors = result.errors.len(),
            cancelled = result.cancelled,
            "push finished"
        );
        Ok(result)
    }

    async fn push_one(&self, issue: &LocalIssue, numbers: &mut HashMap<String, u64>) -> DomainResult<PairOutcome> {
        let local_id = require_id(issue)?;
        match self.mappings.get_mapping(self.installation.id, local_id).await? {
            None => {
                let mapping = self.create_external_pair(issue, numbers).await?;
                numbers.insert(mapping.local_id.clone(), mapping.external_number);
                Ok(PairOutcome::Created(mapping.local_id))
            }
            Some(mapping) => {
                self.overwrite_external(&mapping, issue, numbers).await?;
                Ok(PairOutcome::Updated(mapping.local_id))
            }
        }
    }

    async fn pull_issues(&self, cancel: &CancellationToken) -> DomainResult<SyncResult> {
        let mut result = SyncResult::default();
        let issues = match self.tracker.list_issues(IssueStateFilter::All).await {
            Ok(issues) => issues,
            Err(e) => {
                warn!(installation_id = %self.installation.id, error = %e, "listing external issues failed");
                result.record_error(PULL_ERROR_KEY, &DomainError::from(e));
                return Ok(result);
            }
        };
        let mut local_ids = self.local_ids().await?;

        for issue in issues.iter().filter(|issue| !issue.is_pull_request()) {
            if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }
            match self.pull_one(issue, &mut local_ids).await {
                Ok(outcome) => outcome.record(&mut result),
                Err(e) => {
                    warn!(external_number = issue.number, error = %e, "pull failed");
                    result.record_error(ItemError::external_key(issue.number), &e);
                }
            }
        }

        info!(
            installation_id = %self.installation.id,
            created = result.created.len(),
            updated = result.updated.len(),
            orphaned = result.orphaned.len(),
            errors = result.errors.len(),
            cancelled = result.cancelled,
            "pull finished"
        );
        Ok(result)
    }
}
