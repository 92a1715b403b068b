//! Issue mapping store port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{IssueMapping, IssueMappingUpdate, NewIssueMapping};

/// Persistence contract for local id ↔ external number correspondences.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Mapping by local id.
    async fn get_mapping(&self, installation_id: Uuid, local_id: &str) -> DomainResult<Option<IssueMapping>>;

    async fn get_mapping_by_external(
        &self,
        installation_id: Uuid,
        external_number: u64,
    ) -> DomainResult<Option<IssueMapping>>;

    /// Create a mapping. Fails with `DuplicateMapping` when either the local
    /// id or the external number is already bound for the installation.
    async fn create_mapping(&self, data: NewIssueMapping) -> DomainResult<IssueMapping>;

    /// Apply a partial update; fails with `MappingNotFound` for unknown ids.
    async fn update_mapping(&self, id: Uuid, update: &IssueMappingUpdate) -> DomainResult<IssueMapping>;

    /// Every mapping of the installation.
    async fn list_mappings(&self, installation_id: Uuid) -> DomainResult<Vec<IssueMapping>>;
}
