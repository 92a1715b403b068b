//! External issue tracker port.

use async_trait::async_trait;

use crate::domain::errors::TrackerError;
use crate::domain::models::{ExternalIssue, ExternalIssueUpdate, ExternalPayload, IssueStateFilter};

/// Client for an external issue tracker scoped to one repository.
///
/// Implementations report failures as [`TrackerError`] so callers can tell
/// transient failures from permanent ones.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Create an issue and return it as stored by the tracker.
    ///
    /// New issues start open whatever `payload.state` says; callers close
    /// them with [`IssueTracker::update_issue`] once the pair is bound.
    /// Creating is not idempotent: a repeated call opens a second issue.
    async fn create_issue(&self, payload: &ExternalPayload) -> Result<ExternalIssue, TrackerError>;

    /// Apply a partial update to an existing issue.
    async fn update_issue(
        &self,
        number: u64,
        update: &ExternalIssueUpdate,
    ) -> Result<ExternalIssue, TrackerError>;

    /// Fetch one issue.
    async fn get_issue(&self, number: u64) -> Result<ExternalIssue, TrackerError>;

    /// List every issue in the given state. Pull requests are not issues
    /// and are never returned.
    async fn list_issues(&self, state: IssueStateFilter) -> Result<Vec<ExternalIssue>, TrackerError>;

    /// Add labels, keeping the existing ones.
    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), TrackerError>;

    /// Remove one label.
    async fn remove_label(&self, number: u64, label: &str) -> Result<(), TrackerError>;
}
