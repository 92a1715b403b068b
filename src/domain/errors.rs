//! Domain errors for the beadsync engine.

use thiserror::Error;
use uuid::Uuid;

/// Failure reported by an external issue tracker client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// Non-success response other than a recognised rate limit.
    #[error("tracker returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Primary or secondary rate limit hit.
    #[error("tracker rate limit exceeded: {0}")]
    RateLimited(String),

    /// Connection-level failure; no response was read.
    #[error("network error: {0}")]
    Network(String),

    /// No response within the per-call timeout (milliseconds).
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    /// Response body did not match the expected shape.
    #[error("failed to decode tracker response: {0}")]
    Decode(String),
}

impl TrackerError {
    /// Whether retrying the same request may succeed.
    ///
    /// Rate limits, server errors, network failures and timeouts are
    /// transient. Other client errors (400, 401, 403, 404, 422) and
    /// decode failures are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::RateLimited(_) | Self::Network(_) | Self::Timeout(_) => true,
            Self::Decode(_) => false,
        }
    }

    /// Whether the tracker refused the request without acting on it.
    ///
    /// Only rate limit rejections qualify, so only these are safe to retry
    /// for calls that are not idempotent.
    pub fn is_rejected_unprocessed(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Http { status: 429, .. })
    }
}

/// Domain-level errors that can occur while synchronizing issues.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Input rejected before any side effect.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// No installation is configured for this store.
    #[error("Not connected: run `beadsync connect <owner> <repo>` first")]
    NotConnected,

    #[error(
        "Duplicate mapping for installation {installation_id}: local {local_id} / external #{external_number}"
    )]
    /// A mapping already binds the local id or the external number.
    DuplicateMapping {
        installation_id: Uuid,
        local_id: String,
        external_number: u64,
    },

    /// No mapping with this id.
    #[error("Mapping not found: {0}")]
    MappingNotFound(String),

    /// No local issue with this id.
    #[error("Issue not found: {0}")]
    IssueNotFound(String),

    /// No installation with this id.
    #[error("Installation not found: {0}")]
    InstallationNotFound(Uuid),

    /// The tracker call failed.
    #[error("External API error: {0}")]
    ExternalApi(#[from] TrackerError),

    /// Storage failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Another process holds the installation's sync lease.
    #[error("A sync for installation {0} is already running")]
    SyncInProgress(Uuid),

    /// Stopped by a cancellation signal.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result alias used across the domain and its ports.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let rate = TrackerError::Http { status: 429, message: "slow down".into() };
        let server = TrackerError::Http { status: 502, message: "bad gateway".into() };
        let missing = TrackerError::Http { status: 404, message: "not found".into() };
        let unprocessable = TrackerError::Http { status: 422, message: "invalid".into() };

        assert!(rate.is_transient());
        assert!(server.is_transient());
        assert!(!missing.is_transient());
        assert!(!unprocessable.is_transient());
        assert!(TrackerError::Network("reset".into()).is_transient());
        assert!(TrackerError::Timeout(500).is_transient());
        assert!(!TrackerError::Decode("eof".into()).is_transient());
    }

    #[test]
    fn test_only_rate_limits_are_rejected_unprocessed() {
        assert!(TrackerError::RateLimited("secondary".into()).is_rejected_unprocessed());
        assert!(TrackerError::Http { status: 429, message: "slow down".into() }.is_rejected_unprocessed());
        assert!(!TrackerError::Http { status: 502, message: "bad gateway".into() }.is_rejected_unprocessed());
        assert!(!TrackerError::Timeout(500).is_rejected_unprocessed());
        assert!(!TrackerError::Network("reset".into()).is_rejected_unprocessed());
    }

    #[test]
    fn test_tracker_error_converts_into_domain_error() {
        let err: DomainError = TrackerError::Timeout(10).into();
        assert!(matches!(err, DomainError::ExternalApi(TrackerError::Timeout(10))));
        assert!(err.to_string().contains("timed out"));
    }
}
