//! Bucket provisioning workflow.

use std::sync::Arc;

use osbroker_core::instance::ServiceInstance;
use osbroker_core::repository::InstanceRepository;
use osbroker_core::settings::Settings;
use tracing::info;

use crate::error::{BrokerError, BrokerResult};
use crate::storage::StorageService;

use super::{ProvisionRequest, remove_from_sibling_references};

/// Provisioning workflow for object buckets.
pub struct BucketInstanceWorkflow {
    storage: Arc<StorageService>,
    repository: Arc<dyn InstanceRepository>,
}

impl std::fmt::Debug for BucketInstanceWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketInstanceWorkflow").finish_non_exhaustive()
    }
}

impl BucketInstanceWorkflow {
    /// Build the workflow.
    #[must_use]
    pub fn new(storage: Arc<StorageService>, repository: Arc<dyn InstanceRepository>) -> Self {
        Self {
            storage,
            repository,
        }
    }

    /// Create the bucket and return the new instance record carrying the
    /// settings actually applied.
    pub async fn create(&self, request: &ProvisionRequest) -> BrokerResult<ServiceInstance> {
        let alias = request.alias();
        let mut instance = ServiceInstance::new(
            &request.instance_id,
            &request.service.id,
            &request.plan.id,
            &alias,
        );
        let applied = self
            .storage
            .create_bucket(
                &request.instance_id,
                &instance.name,
                &request.service,
                &request.plan,
                &request.parameters,
            )
            .await?;
        instance.service_settings = Some(applied);
        Ok(instance)
    }

    /// Recompute the quota for the named bucket from the merged settings.
    pub async fn change_plan(
        &self,
        name: &str,
        request: &ProvisionRequest,
    ) -> BrokerResult<Settings> {
        self.storage
            .change_bucket_plan(name, &request.service, &request.plan, &request.parameters)
            .await
    }

    /// Delete the instance. Shared instances only drop this id from their
    /// siblings' reference sets; the physical bucket is deleted only for the
    /// sole remaining reference.
    pub async fn delete(&self, instance_id: &str) -> BrokerResult<()> {
        let instance = self
            .repository
            .find(instance_id)
            .await?
            .ok_or_else(|| BrokerError::InstanceNotFound {
                instance_id: instance_id.to_owned(),
            })?;

        if instance.is_shared() {
            info!(instance_id, "releasing shared bucket reference");
            remove_from_sibling_references(self.repository.as_ref(), &instance, instance_id).await
        } else {
            self.storage.delete_bucket(&instance.name).await
        }
    }
}
