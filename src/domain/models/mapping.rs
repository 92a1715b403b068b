//! Issue mapping domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted correspondence between one local issue and one external issue.
///
/// `local_updated_at` and `external_updated_at` hold the timestamps of the
/// two sides as of the last successful sync of this pair, not their live
/// values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMapping {
    /// Mapping identifier.
    pub id: Uuid,
    /// Owning installation.
    pub installation_id: Uuid,
    /// Local issue id; unique per installation.
    pub local_id: String,
    /// External issue number; unique per installation.
    pub external_number: u64,
    /// Browser URL of the external issue.
    pub external_url: String,
    /// When this pair last synced.
    pub last_synced_at: DateTime<Utc>,
    /// Local `updated_at` as of the last sync.
    pub local_updated_at: DateTime<Utc>,
    /// External `updated_at` as of the last sync.
    pub external_updated_at: DateTime<Utc>,
}

impl IssueMapping {
    /// Whether the live local timestamp is newer than the last synced one.
    pub fn local_changed(&self, live: DateTime<Utc>) -> bool {
        live > self.local_updated_at
    }

    /// Whether the live external timestamp is newer than the last synced one.
    pub fn external_changed(&self, live: DateTime<Utc>) -> bool {
        live > self.external_updated_at
    }

    /// Overwrite the fields `update` sets.
    pub fn apply(&mut self, update: &IssueMappingUpdate) {
        if let Some(url) = &update.external_url {
            self.external_url.clone_from(url);
        }
        if let Some(at) = update.last_synced_at {
            self.last_synced_at = at;
        }
        if let Some(at) = update.local_updated_at {
            self.local_updated_at = at;
        }
        if let Some(at) = update.external_updated_at {
            self.external_updated_at = at;
        }
    }
}

/// Data required to create a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssueMapping {
    /// Owning installation.
    pub installation_id: Uuid,
    /// Local issue id.
    pub local_id: String,
    /// External issue number.
    pub external_number: u64,
    /// Browser URL of the external issue.
    pub external_url: String,
    /// Local `updated_at` at binding time.
    pub local_updated_at: DateTime<Utc>,
    /// External `updated_at` at binding time.
    pub external_updated_at: DateTime<Utc>,
}

impl NewIssueMapping {
    /// Assign an id and a sync time.
    pub fn into_mapping(self, synced_at: DateTime<Utc>) -> IssueMapping {
        IssueMapping {
            id: Uuid::new_v4(),
            installation_id: self.installation_id,
            local_id: self.local_id,
            external_number: self.external_number,
            external_url: self.external_url,
            last_synced_at: synced_at,
            local_updated_at: self.local_updated_at,
            external_updated_at: self.external_updated_at,
        }
    }
}

/// Partial mapping update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueMappingUpdate {
    /// New external URL.
    pub external_url: Option<String>,
    /// New sync time.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// New local watermark.
    pub local_updated_at: Option<DateTime<Utc>>,
    /// New external watermark.
    pub external_updated_at: Option<DateTime<Utc>>,
}

impl IssueMappingUpdate {
    /// Refresh every timestamp after a successful pair sync.
    pub fn synced(at: DateTime<Utc>, local_updated_at: DateTime<Utc>, external_updated_at: DateTime<Utc>) -> Self {
        Self {
            external_url: None,
            last_synced_at: Some(at),
            local_updated_at: Some(local_updated_at),
            external_updated_at: Some(external_updated_at),
        }
    }
}
