//! Webhook ingestion.

use tracing::{debug, info, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{ItemError, SyncResult, WebhookAction, WebhookEvent};
use crate::domain::ports::{DeliveryLog, InstallationRepository, IssueTracker, LocalIssueStore, MappingStore};

use super::helpers::PairOutcome;
use super::SyncOrchestrator;

impl<T, S, M, I, D> SyncOrchestrator<T, S, M, I, D>
where
    T: IssueTracker + 'static,
    S: LocalIssueStore + 'static,
    M: MappingStore + 'static,
    I: InstallationRepository + 'static,
    D: DeliveryLog + 'static,
{
    /// Apply one inbound webhook event.
    ///
    /// Non-issue events and already-seen delivery ids yield an empty result
    /// without touching any issue or mapping. The delivery is marked before
    /// it is processed, so a redelivery of a failed event is also ignored.
    /// While another unit holds the installation past the lease wait, the
    /// delivery is left unmarked and
    /// [`SyncInProgress`](crate::domain::errors::DomainError::SyncInProgress)
    /// is returned.
    pub async fn process_webhook_event(&self, event: &WebhookEvent) -> DomainResult<SyncResult> {
        if !event.is_issue_event() {
            debug!(event_kind = %event.event_kind, delivery_id = %event.delivery_id, "ignoring non-issue event");
            return Ok(SyncResult::default());
        }

        let _unit = self.unit_lock.lock().await;
        let mut state = self.begin_unit().await?;

        match self.deliveries.record(self.installation.id, &event.delivery_id).await {
            Ok(true) => {}
            Ok(false) => {
                info!(delivery_id = %event.delivery_id, "duplicate webhook delivery ignored");
                self.abandon_unit(state).await?;
                return Ok(SyncResult::default());
            }
            Err(e) => {
                let outcome = Err(e);
                self.finish_unit(state, &outcome).await?;
                return outcome;
            }
        }

        let mut result = SyncResult::default();
        if let Err(e) = self.apply_issue_event(event, &mut result).await {
            let key = event
                .issue_number()
                .map_or_else(|| "external-unknown".to_string(), ItemError::external_key);
            warn!(delivery_id = %event.delivery_id, error = %e, "webhook event failed");
            result.record_error(key, &e);
        }

        state.last_external_event_cursor = Some(event.delivery_id.clone());
        let outcome = Ok(result);
        self.finish_unit(state, &outcome).await?;
        outcome
    }

    async fn apply_issue_event(&self, event: &WebhookEvent, result: &mut SyncResult) -> DomainResult<()> {
        let issue = event.issue()?;
        if issue.is_pull_request() {
            debug!(external_number = issue.number, "ignoring pull request event");
            return Ok(());
        }

        let action = WebhookAction::parse(&event.action);
        let mapping = self
            .mappings
            .get_mapping_by_external(self.installation.id, issue.number)
            .await?;

        let outcome = match (action, mapping) {
            (WebhookAction::Removed, Some(mapping)) => {
                info!(local_id = %mapping.local_id, external_number = issue.number, "external issue removed");
                PairOutcome::Orphaned(mapping.local_id)
            }
            (WebhookAction::Removed, None) => return Ok(()),
            (action, None) => {
                if !action.creates_when_unbound() {
                    debug!(external_number = issue.number, action = %event.action, "ignoring action on unbound issue");
                    return Ok(());
                }
                let local_id = self.create_local_pair(&issue, &self.local_ids().await?).await?;
                PairOutcome::Created(local_id)
            }
            (_, Some(mapping)) if !mapping.external_changed(issue.updated_at) => {
                debug!(local_id = %mapping.local_id, external_number = issue.number, "suppressing echo of own write");
                PairOutcome::Skipped(mapping.local_id)
            }
            (_, Some(mapping)) => match self.store.get(&mapping.local_id).await? {
                None => PairOutcome::Orphaned(mapping.local_id),
                Some(existing) => {
                    let local_ids = self.local_ids().await?;
                    self.overwrite_local(&mapping, &existing, &issue, &local_ids).await?;
                    PairOutcome::Updated(mapping.local_id)
                }
            },
        };
        outcome.record(result);
        Ok(())
    }
}
