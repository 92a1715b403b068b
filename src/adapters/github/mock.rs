//! Mock issue tracker for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use crate::domain::errors::TrackerError;
use crate::domain::models::{
    ExternalIssue, ExternalIssueUpdate, ExternalLabel, ExternalPayload, ExternalState, ExternalUser,
    IssueStateFilter,
};
use crate::domain::ports::IssueTracker;

/// Tracker operations that can be counted or made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerOp {
    /// `create_issue`
    Create,
    /// `update_issue`
    Update,
    /// `get_issue`
    Get,
    /// `list_issues`
    List,
    /// `add_labels`
    AddLabels,
    /// `remove_label`
    RemoveLabel,
}

#[derive(Debug, Clone)]
struct FailureRule {
    op: TrackerOp,
    /// Only calls touching an issue with this title fail.
    title: Option<String>,
    error: TrackerError,
    /// `None` fails forever.
    remaining: Option<usize>,
}

/// In-memory tracker with failure injection and call counters.
///
/// Every write advances the issue's `updated_at` by at least one second
/// past the previous write so change detection behaves like the real API.
/// Created issues start open, as on GitHub.
pub struct MockTracker {
    owner: String,
    repo: String,
    issues: Arc<RwLock<BTreeMap<u64, ExternalIssue>>>,
    failures: Arc<RwLock<Vec<FailureRule>>>,
    calls: Arc<RwLock<HashMap<TrackerOp, usize>>>,
}

impl MockTracker {
    /// Empty tracker for `owner/repo`.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            issues: Arc::new(RwLock::new(BTreeMap::new())),
            failures: Arc::new(RwLock::new(Vec::new())),
            calls: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seed an issue as if it had been created on the tracker directly.
    pub async fn insert_issue(&self, issue: ExternalIssue) {
        self.issues.write().await.insert(issue.number, issue);
    }

    /// Remove an issue, as if it was deleted or transferred away.
    pub async fn remove_issue(&self, number: u64) -> Option<ExternalIssue> {
        self.issues.write().await.remove(&number)
    }

    /// Current copy of issue `number`.
    pub async fn issue(&self, number: u64) -> Option<ExternalIssue> {
        self.issues.read().await.get(&number).cloned()
    }

    /// Every issue, by number.
    pub async fn issues(&self) -> Vec<ExternalIssue> {
        self.issues.read().await.values().cloned().collect()
    }

    /// How many issues exist.
    pub async fn issue_count(&self) -> usize {
        self.issues.read().await.len()
    }

    /// Make every call of `op` fail with `error`.
    pub async fn fail_always(&self, op: TrackerOp, error: TrackerError) {
        self.push_rule(op, None, error, None).await;
    }

    /// Make the next `times` calls of `op` fail with `error`.
    pub async fn fail_times(&self, op: TrackerOp, error: TrackerError, times: usize) {
        self.push_rule(op, None, error, Some(times)).await;
    }

    /// Make create/update calls for the issue titled `title` fail.
    pub async fn fail_for_title(&self, op: TrackerOp, title: impl Into<String>, error: TrackerError) {
        self.push_rule(op, Some(title.into()), error, None).await;
    }

    /// Drop every failure rule.
    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Calls of `op` so far, failed ones included.
    pub async fn call_count(&self, op: TrackerOp) -> usize {
        self.calls.read().await.get(&op).copied().unwrap_or(0)
    }

    async fn push_rule(&self, op: TrackerOp, title: Option<String>, error: TrackerError, remaining: Option<usize>) {
        self.failures.write().await.push(FailureRule { op, title, error, remaining });
    }

    /// Count the call and return the injected failure, if any applies.
    async fn enter(&self, op: TrackerOp, title: Option<&str>) -> Result<(), TrackerError> {
        *self.calls.write().await.entry(op).or_insert(0) += 1;

        let mut failures = self.failures.write().await;
        let hit = failures.iter_mut().find(|rule| {
            rule.op == op
                && rule.remaining != Some(0)
                && rule.title.as_deref().map_or(true, |t| Some(t) == title)
        });
        match hit {
            Some(rule) => {
                if let Some(left) = rule.remaining.as_mut() {
                    *left -= 1;
                }
                Err(rule.error.clone())
            }
            None => Ok(()),
        }
    }

    fn not_found(number: u64) -> TrackerError {
        TrackerError::Http {
            status: 404,
            message: format!("issue #{number} not found"),
        }
    }

    /// Timestamp for a write: now, but strictly after the previous value.
    fn next_timestamp(previous: chrono::DateTime<Utc>) -> chrono::DateTime<Utc> {
        let now = Utc::now();
        if now > previous {
            now
        } else {
            previous + Duration::seconds(1)
        }
    }
}

#[async_trait]
impl IssueTracker for MockTracker {
    async fn create_issue(&self, payload: &ExternalPayload) -> Result<ExternalIssue, TrackerError> {
        self.enter(TrackerOp::Create, Some(&payload.title)).await?;

        let mut issues = self.issues.write().await;
        let number = issues.keys().next_back().copied().unwrap_or(0) + 1;
        let now = Utc::now();
        let issue = ExternalIssue {
            number,
            title: payload.title.clone(),
            body: Some(payload.body.clone()),
            state: ExternalState::Open,
            labels: payload.labels.iter().map(|name| ExternalLabel { name: name.clone() }).collect(),
            assignee: payload.assignees.first().map(|login| ExternalUser { login: login.clone() }),
            created_at: now,
            updated_at: now,
            closed_at: None,
            html_url: format!("https://github.com/{}/{}/issues/{number}", self.owner, self.repo),
            pull_request: None,
        };
        issues.insert(number, issue.clone());
        Ok(issue)
    }

    async fn update_issue(&self, number: u64, update: &ExternalIssueUpdate) -> Result<ExternalIssue, TrackerError> {
        let title = self.issues.read().await.get(&number).map(|i| i.title.clone());
        self.enter(TrackerOp::Update, title.as_deref().or(update.title.as_deref())).await?;

        let mut issues = self.issues.write().await;
        let issue = issues.get_mut(&number).ok_or_else(|| Self::not_found(number))?;
        if let Some(title) = &update.title {
            issue.title.clone_from(title);
        }
        if let Some(body) = &update.body {
            issue.body = Some(body.clone());
        }
        if let Some(labels) = &update.labels {
            issue.labels = labels.iter().map(|name| ExternalLabel { name: name.clone() }).collect();
        }
        if let Some(assignees) = &update.assignees {
            issue.assignee = assignees.first().map(|login| ExternalUser { login: login.clone() });
        }
        issue.updated_at = Self::next_timestamp(issue.updated_at);
        if let Some(state) = update.state {
            issue.closed_at = match state {
                ExternalState::Closed => issue.closed_at.or(Some(issue.updated_at)),
                ExternalState::Open => None,
            };
            issue.state = state;
        }
        Ok(issue.clone())
    }

    async fn get_issue(&self, number: u64) -> Result<ExternalIssue, TrackerError> {
        self.enter(TrackerOp::Get, None).await?;
        self.issue(number).await.ok_or_else(|| Self::not_found(number))
    }

    async fn list_issues(&self, state: IssueStateFilter) -> Result<Vec<ExternalIssue>, TrackerError> {
        self.enter(TrackerOp::List, None).await?;
        Ok(self
            .issues
            .read()
            .await
            .values()
            .filter(|issue| !issue.is_pull_request())
            .filter(|issue| match state {
                IssueStateFilter::All => true,
                IssueStateFilter::Open => issue.state == ExternalState::Open,
                IssueStateFilter::Closed => issue.state == ExternalState::Closed,
            })
            .cloned()
            .collect())
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), TrackerError> {
        self.enter(TrackerOp::AddLabels, None).await?;
        let mut issues = self.issues.write().await;
        let issue = issues.get_mut(&number).ok_or_else(|| Self::not_found(number))?;
        for label in labels {
            if !issue.labels.iter().any(|l| &l.name == label) {
                issue.labels.push(ExternalLabel { name: label.clone() });
            }
        }
        issue.updated_at = Self::next_timestamp(issue.updated_at);
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<(), TrackerError> {
        self.enter(TrackerOp::RemoveLabel, None).await?;
        let mut issues = self.issues.write().await;
        let issue = issues.get_mut(&number).ok_or_else(|| Self::not_found(number))?;
        issue.labels.retain(|l| l.name != label);
        issue.updated_at = Self::next_timestamp(issue.updated_at);
        Ok(())
    }
}
