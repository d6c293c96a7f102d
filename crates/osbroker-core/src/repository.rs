//! Repository contracts for durable instance and binding records.
//!
//! The broker treats record storage as a simple keyed store with
//! `find`/`save`/`delete` semantics and per-key consistency. There is no
//! compare-and-swap: reference-set mutation is read-modify-write, so
//! concurrent saves against the same shared instance can lose updates.
//! Callers are expected to retry idempotently at the protocol layer.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::binding::ServiceInstanceBinding;
use crate::instance::ServiceInstance;

/// Repository error type.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The backing store rejected or failed the operation.
    #[error("repository operation failed: {0}")]
    Store(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Durable storage for [`ServiceInstance`] records.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Find an instance by id. Returns `None` when absent.
    async fn find(&self, instance_id: &str) -> RepositoryResult<Option<ServiceInstance>>;

    /// Save (insert or replace) an instance record.
    async fn save(&self, instance: &ServiceInstance) -> RepositoryResult<()>;

    /// Delete an instance record by id. Deleting an absent id is a no-op.
    async fn delete(&self, instance_id: &str) -> RepositoryResult<()>;
}

/// Durable storage for [`ServiceInstanceBinding`] records.
#[async_trait]
pub trait BindingRepository: Send + Sync {
    /// Find a binding by id. Returns `None` when absent.
    async fn find(&self, binding_id: &str) -> RepositoryResult<Option<ServiceInstanceBinding>>;

    /// Save (insert or replace) a binding record.
    async fn save(&self, binding: &ServiceInstanceBinding) -> RepositoryResult<()>;

    /// Delete a binding record by id. Deleting an absent id is a no-op.
    async fn delete(&self, binding_id: &str) -> RepositoryResult<()>;
}

/// In-memory instance repository backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryInstanceRepository {
    records: DashMap<String, ServiceInstance>,
}

impl InMemoryInstanceRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the repository is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl InstanceRepository for InMemoryInstanceRepository {
    async fn find(&self, instance_id: &str) -> RepositoryResult<Option<ServiceInstance>> {
        Ok(self.records.get(instance_id).map(|r| r.value().clone()))
    }

    async fn save(&self, instance: &ServiceInstance) -> RepositoryResult<()> {
        debug!(instance_id = %instance.instance_id, "saving instance record");
        self.records
            .insert(instance.instance_id.clone(), instance.clone());
        Ok(())
    }

    async fn delete(&self, instance_id: &str) -> RepositoryResult<()> {
        debug!(instance_id, "deleting instance record");
        self.records.remove(instance_id);
        Ok(())
    }
}

/// In-memory binding repository backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryBindingRepository {
    records: DashMap<String, ServiceInstanceBinding>,
}

impl InMemoryBindingRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the repository is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl BindingRepository for InMemoryBindingRepository {
    async fn find(&self, binding_id: &str) -> RepositoryResult<Option<ServiceInstanceBinding>> {
        Ok(self.records.get(binding_id).map(|r| r.value().clone()))
    }

    async fn save(&self, binding: &ServiceInstanceBinding) -> RepositoryResult<()> {
        debug!(binding_id = %binding.binding_id, "saving binding record");
        self.records
            .insert(binding.binding_id.clone(), binding.clone());
        Ok(())
    }

    async fn delete(&self, binding_id: &str) -> RepositoryResult<()> {
        debug!(binding_id, "deleting binding record");
        self.records.remove(binding_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::settings::Settings;

    use super::*;

    #[tokio::test]
    async fn test_should_save_find_and_delete_instance() {
        let repo = InMemoryInstanceRepository::new();
        let instance = ServiceInstance::new("inst-1", "svc", "plan", "");

        repo.save(&instance).await.expect("save");
        assert_eq!(repo.len(), 1);

        let found = repo.find("inst-1").await.expect("find");
        assert_eq!(found.map(|i| i.name), Some("inst-1".to_owned()));

        repo.delete("inst-1").await.expect("delete");
        assert!(repo.is_empty());
        assert!(repo.find("inst-1").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn test_should_replace_instance_on_save() {
        let repo = InMemoryInstanceRepository::new();
        let mut instance = ServiceInstance::new("inst-1", "svc", "plan-a", "");
        repo.save(&instance).await.expect("save");

        instance.update_plan("plan-b", Settings::new());
        repo.save(&instance).await.expect("save");

        let found = repo.find("inst-1").await.expect("find");
        assert_eq!(found.map(|i| i.plan_id), Some("plan-b".to_owned()));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_should_ignore_delete_of_absent_instance() {
        let repo = InMemoryInstanceRepository::new();
        repo.delete("ghost").await.expect("delete");
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_should_save_find_and_delete_binding() {
        let repo = InMemoryBindingRepository::new();
        let binding = ServiceInstanceBinding::new(
            "binding-1",
            "inst-1",
            Settings::new(),
            Vec::new(),
            Settings::new(),
        );

        repo.save(&binding).await.expect("save");
        let found = repo.find("binding-1").await.expect("find");
        assert_eq!(found.map(|b| b.instance_id), Some("inst-1".to_owned()));

        repo.delete("binding-1").await.expect("delete");
        assert!(repo.find("binding-1").await.expect("find").is_none());
    }
}
