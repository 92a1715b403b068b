//! Retry decorator for any [`IssueTracker`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::TrackerError;
use crate::domain::models::{ExternalIssue, ExternalIssueUpdate, ExternalPayload, IssueStateFilter};
use crate::domain::ports::IssueTracker;
use crate::infrastructure::retry::RetryPolicy;

/// Runs every call of the wrapped tracker under a [`RetryPolicy`].
///
/// Creating an issue is retried only when the tracker rejected the request
/// unprocessed; any other failure may have left a created issue behind.
pub struct RetryingTracker<T: IssueTracker> {
    inner: Arc<T>,
    policy: RetryPolicy,
}

impl<T: IssueTracker> RetryingTracker<T> {
    /// Wrap `inner`.
    pub fn new(inner: Arc<T>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped tracker.
    pub fn inner(&self) -> &Arc<T> {
        &self.inner
    }
}

#[async_trait]
impl<T: IssueTracker + 'static> IssueTracker for RetryingTracker<T> {
    async fn create_issue(&self, payload: &ExternalPayload) -> Result<ExternalIssue, TrackerError> {
        self.policy
            .execute_when(TrackerError::is_rejected_unprocessed, || self.inner.create_issue(payload))
            .await
    }

    async fn update_issue(&self, number: u64, update: &ExternalIssueUpdate) -> Result<ExternalIssue, TrackerError> {
        self.policy.execute(|| self.inner.update_issue(number, update)).await
    }

    async fn get_issue(&self, number: u64) -> Result<ExternalIssue, TrackerError> {
        self.policy.execute(|| self.inner.get_issue(number)).await
    }

    async fn list_issues(&self, state: IssueStateFilter) -> Result<Vec<ExternalIssue>, TrackerError> {
        self.policy.execute(|| self.inner.list_issues(state)).await
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), TrackerError> {
        self.policy.execute(|| self.inner.add_labels(number, labels)).await
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<(), TrackerError> {
        self.policy.execute(|| self.inner.remove_label(number, label)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::github::mock::{MockTracker, TrackerOp};
    use crate::domain::models::ExternalState;
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            call_timeout: Duration::from_secs(1),
            overall_timeout: Duration::from_secs(5),
        }
    }

    fn payload(title: &str) -> ExternalPayload {
        ExternalPayload {
            title: title.into(),
            body: String::new(),
            labels: vec![],
            assignees: vec![],
            state: ExternalState::Open,
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_transparently() {
        let mock = Arc::new(MockTracker::new("o", "r"));
        let created = mock.create_issue(&payload("retry me")).await.unwrap();
        mock.fail_times(TrackerOp::Get, TrackerError::Http { status: 503, message: "down".into() }, 2)
            .await;
        let tracker = RetryingTracker::new(mock.clone(), fast_policy());

        let fetched = tracker.get_issue(created.number).await.unwrap();
        assert_eq!(fetched.title, "retry me");
        assert_eq!(mock.call_count(TrackerOp::Get).await, 3);
    }

    #[tokio::test]
    async fn test_create_retries_only_rate_limit_rejections() {
        let mock = Arc::new(MockTracker::new("o", "r"));
        mock.fail_times(TrackerOp::Create, TrackerError::RateLimited("secondary".into()), 2)
            .await;
        let tracker = RetryingTracker::new(mock.clone(), fast_policy());

        tracker.create_issue(&payload("limited")).await.unwrap();
        assert_eq!(mock.call_count(TrackerOp::Create).await, 3);
        assert_eq!(mock.issue_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_is_not_repeated_after_server_error() {
        let mock = Arc::new(MockTracker::new("o", "r"));
        mock.fail_times(TrackerOp::Create, TrackerError::Http { status: 502, message: "bad gateway".into() }, 1)
            .await;
        let tracker = RetryingTracker::new(mock.clone(), fast_policy());

        let result = tracker.create_issue(&payload("once")).await;
        assert!(matches!(result, Err(TrackerError::Http { status: 502, .. })));
        assert_eq!(mock.call_count(TrackerOp::Create).await, 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_last_error() {
        let mock = Arc::new(MockTracker::new("o", "r"));
        mock.fail_times(TrackerOp::List, TrackerError::Network("reset".into()), 10).await;
        let tracker = RetryingTracker::new(mock.clone(), fast_policy());

        let result = tracker.list_issues(IssueStateFilter::All).await;
        assert!(matches!(result, Err(TrackerError::Network(_))));
        assert_eq!(mock.call_count(TrackerOp::List).await, 3);
    }
}
