//! External tracker issue shapes.
//!
//! Field names follow the GitHub REST API v3 so that list responses and
//! webhook payloads deserialize directly into [`ExternalIssue`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Open/closed state on the external tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalState {
    /// Issue is open.
    Open,
    /// Issue is closed.
    Closed,
}

impl ExternalState {
    /// Wire value, as GitHub spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// State filter for list requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueStateFilter {
    /// Only open issues.
    Open,
    /// Only closed issues.
    Closed,
    /// Both states.
    All,
}

impl IssueStateFilter {
    /// Value of the `state` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

/// A label applied to an external issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLabel {
    /// Label name.
    pub name: String,
}

/// A user reference on the external tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalUser {
    /// Account login.
    pub login: String,
}

/// Marker present on pull requests returned by the issues endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    /// API URL of the pull request.
    #[serde(default)]
    pub url: Option<String>,
}

/// An issue as reported by the external tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIssue {
    /// Sequential number within the repository.
    pub number: u64,
    /// Issue title.
    pub title: String,
    /// Markdown body; absent when empty.
    #[serde(default)]
    pub body: Option<String>,
    /// Open or closed.
    pub state: ExternalState,
    /// Labels in tracker order.
    #[serde(default)]
    pub labels: Vec<ExternalLabel>,
    /// First assignee.
    #[serde(default)]
    pub assignee: Option<ExternalUser>,
    /// When the issue was opened.
    pub created_at: DateTime<Utc>,
    /// Last modification on the tracker; drives change detection.
    pub updated_at: DateTime<Utc>,
    /// Set while the issue is closed.
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Browser URL of the issue.
    pub html_url: String,
    /// Present when the item is actually a pull request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<PullRequestRef>,
}

impl ExternalIssue {
    /// Label names, in order.
    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }

    /// Pull requests share the issues endpoints and are never synced.
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// Full issue content sent when creating or overwriting an external issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPayload {
    /// Title to set.
    pub title: String,
    /// Body including the metadata footer.
    pub body: String,
    /// Complete label set; replaces the current labels.
    pub labels: Vec<String>,
    /// Complete assignee list.
    pub assignees: Vec<String>,
    /// State to set.
    pub state: ExternalState,
}

/// Partial update; `None` fields are left untouched by the tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIssueUpdate {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Replacement label set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    /// Replacement assignee list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<String>>,
    /// New state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ExternalState>,
}

impl From<ExternalPayload> for ExternalIssueUpdate {
    fn from(payload: ExternalPayload) -> Self {
        Self {
            title: Some(payload.title),
            body: Some(payload.body),
            labels: Some(payload.labels),
            assignees: Some(payload.assignees),
            state: Some(payload.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_issue_deserialization() {
        let json = r#"{
            "id": 1,
            "number": 42,
            "title": "Fix login bug",
            "body": "Users cannot log in after the last deploy.",
            "state": "open",
            "labels": [
                { "name": "bug", "color": "d73a4a" },
                { "name": "P1", "color": "e4e669" }
            ],
            "assignee": { "login": "octocat", "id": 583231 },
            "created_at": "2024-01-14T08:00:00Z",
            "updated_at": "2024-01-15T10:30:00Z",
            "closed_at": null,
            "html_url": "https://github.com/org/repo/issues/42"
        }"#;
        let issue: ExternalIssue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.number, 42);
        assert_eq!(issue.state, ExternalState::Open);
        assert_eq!(issue.label_names(), vec!["bug", "P1"]);
        assert_eq!(issue.assignee.unwrap().login, "octocat");
        assert!(issue.closed_at.is_none());
        assert!(issue.pull_request.is_none());
    }

    #[test]
    fn test_minimal_issue_deserialization() {
        let json = r#"{
            "number": 1,
            "title": "Minimal issue",
            "body": null,
            "state": "closed",
            "created_at": "2024-01-09T00:00:00Z",
            "updated_at": "2024-01-10T00:00:00Z",
            "closed_at": "2024-01-10T00:00:00Z",
            "html_url": "https://github.com/org/repo/issues/1"
        }"#;
        let issue: ExternalIssue = serde_json::from_str(json).unwrap();
        assert!(issue.body.is_none());
        assert!(issue.labels.is_empty());
        assert!(issue.assignee.is_none());
        assert_eq!(issue.state, ExternalState::Closed);
    }

    #[test]
    fn test_pull_request_detection() {
        let json = r#"{
            "number": 99,
            "title": "Add feature X",
            "state": "open",
            "pull_request": { "url": "https://api.github.com/repos/org/repo/pulls/99" },
            "created_at": "2024-01-15T09:00:00Z",
            "updated_at": "2024-01-16T12:00:00Z",
            "html_url": "https://github.com/org/repo/pull/99"
        }"#;
        let issue: ExternalIssue = serde_json::from_str(json).unwrap();
        assert!(issue.is_pull_request());
    }

    #[test]
    fn test_partial_update_omits_unset_fields() {
        let update = ExternalIssueUpdate {
            state: Some(ExternalState::Closed),
            ..Default::default()
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"state":"closed"}"#);
    }
}
