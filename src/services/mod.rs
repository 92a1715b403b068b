//! Application services.

pub mod convention_mapper;
pub mod delivery_pruner;
pub mod issue_converter;
pub mod sync_orchestrator;

pub use convention_mapper::{ConventionMapper, Relations, METADATA_MARKER};
pub use delivery_pruner::{DeliveryPruner, PrunerConfig, PrunerStatus, StopReason};
pub use issue_converter::{external_ref, localize_references, to_external, to_local};
pub use sync_orchestrator::{SyncLease, SyncOrchestrator, PULL_ERROR_KEY};
