//! Domain models for the sync engine.

pub mod config;
pub mod conventions;
pub mod external;
pub mod installation;
pub mod issue;
pub mod mapping;
pub mod sync;

pub use config::{
    Config, DatabaseConfig, GitHubConfig, LoggingConfig, RetryConfig, SyncConfig, WebhookConfig,
};
pub use conventions::{
    ConventionConfig, DependencyConventions, EpicConventions, LabelConventions, StatusLabels,
};
pub use external::{
    ExternalIssue, ExternalIssueUpdate, ExternalLabel, ExternalPayload, ExternalState,
    ExternalUser, IssueStateFilter, PullRequestRef,
};
pub use installation::{Installation, SyncState, SyncStatus};
pub use issue::{IssueStatus, IssueType, LocalIssue, Priority};
pub use mapping::{IssueMapping, IssueMappingUpdate, NewIssueMapping};
pub use sync::{
    resolve, ConflictStrategy, ItemError, Resolution, SyncConflict, SyncDirection, SyncResult,
    WebhookAction, WebhookEvent, ISSUES_EVENT,
};
