//! GitHub Issues API request models.
//!
//! Responses deserialize straight into
//! [`ExternalIssue`](crate::domain::models::ExternalIssue); only request
//! bodies and the error envelope live here.

use serde::{Deserialize, Serialize};

use crate::domain::models::ExternalPayload;

/// Request body for creating a new GitHub issue.
///
/// The create endpoint ignores `state`; closed issues are closed with a
/// follow-up update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIssueRequest {
    /// Issue title.
    pub title: String,
    /// Markdown body.
    pub body: String,
    /// Labels to apply; omitted when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Logins to assign; omitted when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
}

impl From<&ExternalPayload> for CreateIssueRequest {
    fn from(payload: &ExternalPayload) -> Self {
        Self {
            title: payload.title.clone(),
            body: payload.body.clone(),
            labels: payload.labels.clone(),
            assignees: payload.assignees.clone(),
        }
    }
}

/// Request body for adding labels to an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLabelsRequest {
    /// Labels to add.
    pub labels: Vec<String>,
}

/// Error envelope returned by the API on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubErrorBody {
    /// Human-readable reason.
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ExternalState;

    #[test]
    fn test_create_request_omits_empty_lists() {
        let payload = ExternalPayload {
            title: "Bare".into(),
            body: String::new(),
            labels: vec![],
            assignees: vec![],
            state: ExternalState::Open,
        };
        let json = serde_json::to_value(CreateIssueRequest::from(&payload)).unwrap();
        assert_eq!(json, serde_json::json!({ "title": "Bare", "body": "" }));
    }
}
