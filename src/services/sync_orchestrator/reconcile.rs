//! Full bidirectional reconciliation.

use std::collections::{BTreeMap, HashMap};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    resolve, ConflictStrategy, ExternalIssue, IssueMapping, IssueStateFilter, ItemError, LocalIssue, Resolution,
    SyncConflict, SyncResult,
};
use crate::domain::ports::{DeliveryLog, InstallationRepository, IssueTracker, LocalIssueStore, MappingStore};

use super::helpers::{require_id, PairOutcome};
use super::SyncOrchestrator;

/// Lookup tables kept current while a reconciliation pass creates pairs.
struct PassIndex {
    numbers: HashMap<String, u64>,
    local_ids: HashMap<u64, String>,
    mappings: HashMap<String, IssueMapping>,
}

impl<T, S, M, I, D> SyncOrchestrator<T, S, M, I, D>
where
    T: IssueTracker + 'static,
    S: LocalIssueStore + 'static,
    M: MappingStore + 'static,
    I: InstallationRepository + 'static,
    D: DeliveryLog + 'static,
{
    /// Reconcile both stores.
    ///
    /// 1. Unbound local issues are created externally.
    /// 2. Bound pairs where either side changed since the last sync are
    ///    resolved with `strategy` and the losing side is overwritten.
    /// 3. Unbound external issues are created locally.
    ///
    /// Pairs whose counterpart has disappeared are reported as orphaned
    /// and never recreated. Only a failure to list either store aborts.
    pub async fn sync(
        &self,
        strategy: Option<ConflictStrategy>,
        cancel: &CancellationToken,
    ) -> DomainResult<SyncResult> {
        let _unit = self.unit_lock.lock().await;
        let state = self.begin_unit().await?;
        let outcome = self.reconcile(strategy.unwrap_or(self.default_strategy), cancel).await;
        self.finish_unit(state, &outcome).await?;
        outcome
    }

    async fn reconcile(&self, strategy: ConflictStrategy, cancel: &CancellationToken) -> DomainResult<SyncResult> {
        let locals = self.store.list().await?;
        let mut externals: BTreeMap<u64, ExternalIssue> = self
            .tracker
            .list_issues(IssueStateFilter::All)
            .await?
            .into_iter()
            .filter(|issue| !issue.is_pull_request())
            .map(|issue| (issue.number, issue))
            .collect();

        let mappings = self.mappings.list_mappings(self.installation.id).await?;
        let mut index = PassIndex {
            numbers: mappings.iter().map(|m| (m.local_id.clone(), m.external_number)).collect(),
            local_ids: mappings.iter().map(|m| (m.external_number, m.local_id.clone())).collect(),
            mappings: mappings.into_iter().map(|m| (m.local_id.clone(), m)).collect(),
        };

        info!(
            installation_id = %self.installation.id,
            strategy = strategy.as_str(),
            local = locals.len(),
            external = externals.len(),
            "reconciliation started"
        );

        let mut result = SyncResult::default();

        for local in &locals {
            if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }
            match self
                .reconcile_local(local, strategy, &mut externals, &mut index, &mut result)
                .await
            {
                Ok(outcome) => outcome.record(&mut result),
                Err(e) => {
                    warn!(local_id = local.display_id(), error = %e, "reconciling issue failed");
                    result.record_error(local.display_id(), &e);
                }
            }
        }

        for external in externals.values() {
            if result.cancelled || cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }
            match self.reconcile_unbound_external(external, &mut index).await {
                Ok(outcome) => outcome.record(&mut result),
                Err(e) => {
                    warn!(external_number = external.number, error = %e, "importing external issue failed");
                    result.record_error(ItemError::external_key(external.number), &e);
                }
            }
        }

        info!(
            installation_id = %self.installation.id,
            created = result.created.len(),
            updated = result.updated.len(),
            skipped = result.skipped.len(),
            orphaned = result.orphaned.len(),
            conflicts = result.conflicts.len(),
            errors = result.errors.len(),
            cancelled = result.cancelled,
            "reconciliation finished"
        );
        Ok(result)
    }

    async fn reconcile_local(
        &self,
        local: &LocalIssue,
        strategy: ConflictStrategy,
        externals: &mut BTreeMap<u64, ExternalIssue>,
        index: &mut PassIndex,
        result: &mut SyncResult,
    ) -> DomainResult<PairOutcome> {
        let local_id = require_id(local)?;

        let Some(mapping) = index.mappings.get(local_id).cloned() else {
            let mapping = self.create_external_pair(local, &index.numbers).await?;
            index.numbers.insert(mapping.local_id.clone(), mapping.external_number);
            index.local_ids.insert(mapping.external_number, mapping.local_id.clone());
            let local_id = mapping.local_id.clone();
            index.mappings.insert(local_id.clone(), mapping);
            return Ok(PairOutcome::Created(local_id));
        };

        let Some(external) = externals.remove(&mapping.external_number) else {
            debug!(local_id, external_number = mapping.external_number, "external counterpart missing");
            return Ok(PairOutcome::Orphaned(mapping.local_id));
        };

        if !mapping.local_changed(local.updated_at) && !mapping.external_changed(external.updated_at) {
            return Ok(PairOutcome::Skipped(mapping.local_id));
        }

        let resolution = resolve(local.updated_at, external.updated_at, strategy);
        match resolution {
            Resolution::Github => {
                self.overwrite_local(&mapping, local, &external, &index.local_ids).await?;
            }
            Resolution::Beads => {
                self.overwrite_external(&mapping, local, &index.numbers).await?;
            }
        }
        debug!(
            local_id,
            external_number = mapping.external_number,
            resolution = resolution.as_str(),
            "resolved divergent pair"
        );
        result.conflicts.push(SyncConflict {
            local_id: mapping.local_id.clone(),
            external_number: mapping.external_number,
            local_updated_at: local.updated_at,
            external_updated_at: external.updated_at,
            resolution,
        });
        Ok(PairOutcome::Updated(mapping.local_id))
    }

    /// An external issue not claimed by any listed local issue: import it,
    /// unless it is bound to a local issue that no longer exists.
    async fn reconcile_unbound_external(
        &self,
        external: &ExternalIssue,
        index: &mut PassIndex,
    ) -> DomainResult<PairOutcome> {
        if let Some(mapping) = self
            .mappings
            .get_mapping_by_external(self.installation.id, external.number)
            .await?
        {
            debug!(
                local_id = %mapping.local_id,
                external_number = external.number,
                "local counterpart missing"
            );
            return Ok(PairOutcome::Orphaned(mapping.local_id));
        }

        let local_id = self.create_local_pair(external, &index.local_ids).await?;
        index.local_ids.insert(external.number, local_id.clone());
        index.numbers.insert(local_id.clone(), external.number);
        Ok(PairOutcome::Created(local_id))
    }
}
