//! beadsync - bidirectional issue sync between a local beads store and
//! GitHub Issues.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Issue, mapping and sync models plus the port traits
//! - **Service Layer** (`services`): Convention mapping, conversion and the sync orchestrator
//! - **Adapters** (`adapters`): SQLite stores, the GitHub client, the webhook server
//! - **Infrastructure Layer** (`infrastructure`): Configuration, logging, retry
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use beadsync::adapters::github::MockTracker;
//! use beadsync::services::SyncOrchestrator;
//!
//! let orchestrator = SyncOrchestrator::new(installation, Arc::new(MockTracker::new("o", "r")),
//!     store, mappings, installations, deliveries);
//! let result = orchestrator.sync(None, &CancellationToken::new()).await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult, TrackerError};
pub use domain::models::{
    Config, ConflictStrategy, ConventionConfig, ExternalIssue, Installation, IssueMapping, LocalIssue,
    SyncResult, WebhookEvent,
};
pub use domain::ports::{DeliveryLog, InstallationRepository, IssueTracker, LocalIssueStore, MappingStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ConventionMapper, SyncOrchestrator};
