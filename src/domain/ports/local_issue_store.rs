//! Local issue store port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::LocalIssue;

/// The canonical local issue store.
#[async_trait]
pub trait LocalIssueStore: Send + Sync {
    /// Issue by id.
    async fn get(&self, id: &str) -> DomainResult<Option<LocalIssue>>;

    /// Persist a new issue, assigning an id when it has none, and return
    /// the stored record.
    async fn create(&self, issue: &LocalIssue) -> DomainResult<LocalIssue>;

    /// Overwrite an existing issue and return the stored record, whose
    /// `updated_at` reflects the write.
    async fn update(&self, issue: &LocalIssue) -> DomainResult<LocalIssue>;

    /// Every issue, oldest first.
    async fn list(&self) -> DomainResult<Vec<LocalIssue>>;

    /// Remove an issue. Returns whether it existed.
    async fn delete(&self, id: &str) -> DomainResult<bool>;
}
