//! Sync operation inputs and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

use super::external::ExternalIssue;

/// How a detected divergence between the two sides is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// External side always wins.
    GithubWins,
    /// Local side always wins.
    BeadsWins,
    /// Strictly newer side wins; ties go to the external side.
    NewestWins,
}

impl Default for ConflictStrategy {
    fn default() -> Self {
        Self::NewestWins
    }
}

impl ConflictStrategy {
    /// CLI and config spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GithubWins => "github-wins",
            Self::BeadsWins => "beads-wins",
            Self::NewestWins => "newest-wins",
        }
    }

    /// Parse the CLI and config spelling.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "github-wins" => Some(Self::GithubWins),
            "beads-wins" => Some(Self::BeadsWins),
            "newest-wins" => Some(Self::NewestWins),
            _ => None,
        }
    }
}

/// Side whose content survives a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// The external (GitHub) issue overwrites the local one.
    Github,
    /// The local (beads) issue overwrites the external one.
    Beads,
}

impl Resolution {
    /// Name of the winning side.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Beads => "beads",
        }
    }
}

/// Pick the winning side for a pair that changed since its last sync.
///
/// Under `newest-wins` a tie resolves to the external side.
pub fn resolve(
    local_updated_at: DateTime<Utc>,
    external_updated_at: DateTime<Utc>,
    strategy: ConflictStrategy,
) -> Resolution {
    match strategy {
        ConflictStrategy::GithubWins => Resolution::Github,
        ConflictStrategy::BeadsWins => Resolution::Beads,
        ConflictStrategy::NewestWins => {
            if local_updated_at > external_updated_at {
                Resolution::Beads
            } else {
                Resolution::Github
            }
        }
    }
}

/// Which orchestrator operations a manual sync runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Pull, then push.
    Both,
    /// Local to external only.
    Push,
    /// External to local only.
    Pull,
}

impl Default for SyncDirection {
    fn default() -> Self {
        Self::Both
    }
}

/// A divergence detected and auto-resolved during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Local side of the pair.
    pub local_id: String,
    /// External side of the pair.
    pub external_number: u64,
    /// Live local timestamp at detection.
    pub local_updated_at: DateTime<Utc>,
    /// Live external timestamp at detection.
    pub external_updated_at: DateTime<Utc>,
    /// Side that won.
    pub resolution: Resolution,
}

/// A per-item failure collected during a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    /// Local id, `external-<number>`, or `pull` for a list failure.
    pub id: String,
    /// Rendered error.
    pub message: String,
}

impl ItemError {
    /// Capture `err` for the item `id`.
    pub fn new(id: impl Into<String>, err: &DomainError) -> Self {
        Self {
            id: id.into(),
            message: err.to_string(),
        }
    }

    /// Synthetic key for failures tied to an external issue number.
    pub fn external_key(number: u64) -> String {
        format!("external-{number}")
    }
}

/// Outcome of one orchestrator operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Local ids of pairs created on either side.
    pub created: Vec<String>,
    /// Local ids of pairs whose content was overwritten on one side.
    pub updated: Vec<String>,
    /// Local ids of pairs left alone (unchanged, or an echo of our own write).
    pub skipped: Vec<String>,
    /// Pairs whose counterpart vanished; tombstoned, never recreated.
    pub orphaned: Vec<String>,
    /// Divergences resolved by the strategy.
    pub conflicts: Vec<SyncConflict>,
    /// Items that failed; the rest of the batch still ran.
    pub errors: Vec<ItemError>,
    /// Set when a cancellation signal stopped the loop early.
    pub cancelled: bool,
}

impl SyncResult {
    /// True when nothing was touched or attempted.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.skipped.is_empty()
            && self.orphaned.is_empty()
            && self.conflicts.is_empty()
            && self.errors.is_empty()
    }

    /// Whether any item failed.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Record a failure for one item.
    pub fn record_error(&mut self, id: impl Into<String>, err: &DomainError) {
        self.errors.push(ItemError::new(id, err));
    }

    /// Fold another result into this one, preserving order.
    pub fn merge(&mut self, other: Self) {
        self.created.extend(other.created);
        self.updated.extend(other.updated);
        self.skipped.extend(other.skipped);
        self.orphaned.extend(other.orphaned);
        self.conflicts.extend(other.conflicts);
        self.errors.extend(other.errors);
        self.cancelled |= other.cancelled;
    }
}

/// Category of a webhook `action` for the issues event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAction {
    /// The issue was created externally.
    Opened,
    /// Content or state changed (edited, closed, reopened, labels, assignees).
    Edited,
    /// The issue left the repository (deleted or transferred).
    Removed,
    /// Any other action; only refreshes an already bound pair.
    Other(String),
}

impl WebhookAction {
    /// Classify a raw `action` value.
    pub fn parse(action: &str) -> Self {
        match action {
            "opened" => Self::Opened,
            "edited" | "closed" | "reopened" | "labeled" | "unlabeled" | "assigned"
            | "unassigned" => Self::Edited,
            "deleted" | "transferred" => Self::Removed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether an unbound external issue should be created locally.
    pub fn creates_when_unbound(&self) -> bool {
        matches!(self, Self::Opened | Self::Edited)
    }
}

/// Webhook event kind carrying issue changes.
pub const ISSUES_EVENT: &str = "issues";

/// An inbound webhook notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Unique delivery id; used for deduplication.
    pub delivery_id: String,
    /// Event name, e.g. `issues`.
    pub event_kind: String,
    /// Raw `action` from the payload.
    pub action: String,
    /// Full decoded body.
    pub payload: serde_json::Value,
}

impl WebhookEvent {
    /// Build an event from a raw webhook body, reading `action` from it.
    pub fn from_body(
        delivery_id: impl Into<String>,
        event_kind: impl Into<String>,
        body: &[u8],
    ) -> DomainResult<Self> {
        let payload: serde_json::Value = serde_json::from_slice(body)?;
        let action = payload
            .get("action")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            delivery_id: delivery_id.into(),
            event_kind: event_kind.into(),
            action,
            payload,
        })
    }

    /// Only issue events have side effects.
    pub fn is_issue_event(&self) -> bool {
        self.event_kind == ISSUES_EVENT
    }

    /// Decode `payload.issue`.
    pub fn issue(&self) -> DomainResult<ExternalIssue> {
        let raw = self.payload.get("issue").cloned().ok_or_else(|| {
            DomainError::ValidationFailed("webhook payload has no `issue` object".to_string())
        })?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Issue number from the payload, when present.
    pub fn issue_number(&self) -> Option<u64> {
        self.payload
            .get("issue")
            .and_then(|issue| issue.get("number"))
            .and_then(serde_json::Value::as_u64)
    }
}
