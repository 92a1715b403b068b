//! Key/value settings port used by the command facade.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// String settings persisted next to the local store.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Value of `key`, if set.
    async fn get(&self, key: &str) -> DomainResult<Option<String>>;

    /// Insert or overwrite `key`.
    async fn set(&self, key: &str, value: &str) -> DomainResult<()>;

    /// Remove a key; removing a missing key is not an error.
    async fn delete(&self, key: &str) -> DomainResult<()>;
}
