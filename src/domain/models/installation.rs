//! Installation and sync state domain models.
//!
//! An [`Installation`] binds one external repository to the local store.
//! Its [`SyncState`] records the outcome of the most recent sync unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::conventions::ConventionConfig;

/// One external-tracker connection scoped to a single repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installation {
    /// Stable local identifier.
    pub id: Uuid,
    /// Repository owner (user or organisation).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Access credential for the tracker; `None` when supplied out-of-band.
    #[serde(skip_serializing)]
    pub access_credential: Option<String>,
    /// When the credential stops being accepted, if known.
    pub credential_expires_at: Option<DateTime<Utc>>,
    /// Per-installation conventions overriding the configured defaults.
    pub conventions: Option<ConventionConfig>,
    /// When the connection was made.
    pub created_at: DateTime<Utc>,
}

impl Installation {
    /// New installation without a stored credential.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            repo: repo.into(),
            access_credential: None,
            credential_expires_at: None,
            conventions: None,
            created_at: Utc::now(),
        }
    }

    /// Attach a credential and its expiry.
    pub fn with_credential(mut self, credential: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        self.access_credential = Some(credential.into());
        self.credential_expires_at = expires_at;
        self
    }

    /// Override the configured conventions for this installation.
    pub fn with_conventions(mut self, conventions: ConventionConfig) -> Self {
        self.conventions = Some(conventions);
        self
    }

    /// `owner/repo` account reference.
    pub fn account_ref(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Whether the stored credential has expired at `now`.
    pub fn credential_expired(&self, now: DateTime<Utc>) -> bool {
        self.credential_expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Lifecycle status of an installation's sync unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No unit running; the last one succeeded or none ran yet.
    Idle,
    /// A unit holds the lease.
    Syncing,
    /// The last unit failed.
    Error,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl SyncStatus {
    /// Stored value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Error => "error",
        }
    }

    /// Parse a stored value, case-insensitively.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "syncing" => Some(Self::Syncing),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Per-installation sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Owning installation.
    pub installation_id: Uuid,
    /// End of the last successful unit.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Delivery id of the last processed webhook.
    pub last_external_event_cursor: Option<String>,
    /// Last local change pushed, when the store exposes one.
    pub last_local_commit_cursor: Option<String>,
    /// Current lifecycle status.
    pub status: SyncStatus,
    /// Message of the last failure; cleared on success.
    pub error_message: Option<String>,
    /// Consecutive failed sync units; reset by a clean run.
    pub error_count: u32,
}

impl SyncState {
    /// Idle state for an installation that never synced.
    pub fn new(installation_id: Uuid) -> Self {
        Self {
            installation_id,
            last_sync_at: None,
            last_external_event_cursor: None,
            last_local_commit_cursor: None,
            status: SyncStatus::Idle,
            error_message: None,
            error_count: 0,
        }
    }

    /// Enter `syncing`. Allowed from `idle` and from `error`.
    pub fn begin(&mut self) {
        self.status = SyncStatus::Syncing;
    }

    /// Leave `syncing` after a unit with no failures.
    pub fn finish_ok(&mut self, at: DateTime<Utc>) {
        self.status = SyncStatus::Idle;
        self.last_sync_at = Some(at);
        self.error_message = None;
        self.error_count = 0;
    }

    /// Leave `syncing` without running a unit, keeping the previous
    /// outcome.
    pub fn abandon(&mut self) {
        self.status = if self.error_message.is_some() {
            SyncStatus::Error
        } else {
            SyncStatus::Idle
        };
    }

    /// Leave `syncing` after a unit that aborted or had item failures.
    pub fn finish_err(&mut self, message: impl Into<String>) {
        self.status = SyncStatus::Error;
        self.error_message = Some(message.into());
        self.error_count = self.error_count.saturating_add(1);
    }
}
