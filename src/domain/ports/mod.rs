//! Port trait definitions (Hexagonal Architecture)
//!
//! The sync orchestrator depends only on these traits:
//! - IssueTracker: the external tracker client
//! - LocalIssueStore: the canonical local store
//! - MappingStore, InstallationRepository, DeliveryLog: sync bookkeeping
//! - SettingsStore: connection keys for the command facade

pub mod delivery_log;
pub mod installation_repository;
pub mod issue_tracker;
pub mod local_issue_store;
pub mod mapping_store;
pub mod settings_store;

pub use delivery_log::DeliveryLog;
pub use installation_repository::InstallationRepository;
pub use issue_tracker::IssueTracker;
pub use local_issue_store::LocalIssueStore;
pub use mapping_store::MappingStore;
pub use settings_store::SettingsStore;
