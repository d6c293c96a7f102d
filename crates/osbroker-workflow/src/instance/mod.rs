//! Provisioning workflows.
//!
//! One workflow variant exists per resource kind. Selection happens once per
//! request: a `remote_connection` parameter wins over the service
//! definition's declared kind. The workflow value is built from immutable
//! request data and is used for exactly one request.
//!
//! Reference counting note: removing an instance from its siblings'
//! reference sets is read-modify-write against the repository; concurrent
//! deletes of the same shared resource can lose updates (see
//! [`osbroker_core::repository`]).

mod bucket;
mod namespace;
mod remote;

use std::sync::Arc;

use osbroker_core::catalog::{Plan, ResourceKind, ServiceDefinition};
use osbroker_core::instance::ServiceInstance;
use osbroker_core::repository::InstanceRepository;
use osbroker_core::settings::{self, Settings};

pub use bucket::BucketInstanceWorkflow;
pub use namespace::NamespaceInstanceWorkflow;
pub use remote::RemoteConnectionInstanceWorkflow;

use crate::error::BrokerResult;
use crate::storage::StorageService;

/// Immutable context for one provisioning request.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// The logical instance the request targets.
    pub instance_id: String,
    /// Resolved service definition.
    pub service: ServiceDefinition,
    /// Resolved plan.
    pub plan: Plan,
    /// Raw request parameters.
    pub parameters: Settings,
}

impl ProvisionRequest {
    /// The instance alias carried by the request's `name` parameter.
    #[must_use]
    pub fn alias(&self) -> String {
        settings::instance_alias(&self.parameters)
    }
}

/// A provisioning workflow, selected once per request.
#[derive(Debug)]
pub enum InstanceWorkflow {
    /// Provision an object bucket.
    Bucket(BucketInstanceWorkflow),
    /// Provision a tenant namespace.
    Namespace(NamespaceInstanceWorkflow),
    /// Attach to another tenant's existing resource.
    RemoteConnection(RemoteConnectionInstanceWorkflow),
}

impl InstanceWorkflow {
    /// Select the workflow for a create request. A `remote_connection`
    /// parameter overrides kind-based dispatch.
    #[must_use]
    pub fn for_create(
        storage: Arc<StorageService>,
        repository: Arc<dyn InstanceRepository>,
        service: &ServiceDefinition,
        parameters: &Settings,
    ) -> Self {
        if parameters.contains_key(settings::REMOTE_CONNECTION) {
            return Self::RemoteConnection(RemoteConnectionInstanceWorkflow::new(repository));
        }
        Self::for_kind(storage, repository, service)
    }

    /// Select the workflow by the service definition's resource kind, used
    /// for plan changes and deletes.
    #[must_use]
    pub fn for_kind(
        storage: Arc<StorageService>,
        repository: Arc<dyn InstanceRepository>,
        service: &ServiceDefinition,
    ) -> Self {
        match service.service_type {
            ResourceKind::Bucket => Self::Bucket(BucketInstanceWorkflow::new(storage, repository)),
            ResourceKind::Namespace => {
                Self::Namespace(NamespaceInstanceWorkflow::new(storage, repository))
            }
        }
    }

    /// Provision the backing resource and return the new instance record.
    pub async fn create(&self, request: &ProvisionRequest) -> BrokerResult<ServiceInstance> {
        match self {
            Self::Bucket(wf) => wf.create(request).await,
            Self::Namespace(wf) => wf.create(request).await,
            Self::RemoteConnection(wf) => wf.create(request).await,
        }
    }

    /// Apply a plan change to the named resource and return the settings
    /// actually applied.
    pub async fn change_plan(
        &self,
        name: &str,
        request: &ProvisionRequest,
    ) -> BrokerResult<Settings> {
        match self {
            Self::Bucket(wf) => wf.change_plan(name, request).await,
            Self::Namespace(wf) => wf.change_plan(name, request).await,
            Self::RemoteConnection(wf) => wf.change_plan(),
        }
    }

    /// Tear down an instance, deleting the physical resource only when this
    /// is its last reference.
    pub async fn delete(&self, instance_id: &str) -> BrokerResult<()> {
        match self {
            Self::Bucket(wf) => wf.delete(instance_id).await,
            Self::Namespace(wf) => wf.delete(instance_id).await,
            Self::RemoteConnection(wf) => wf.delete(),
        }
    }
}

/// Remove `instance_id` from the reference set of every *other* instance
/// referencing the shared resource, saving each mutated sibling once.
pub(crate) async fn remove_from_sibling_references(
    repository: &dyn InstanceRepository,
    instance: &ServiceInstance,
    instance_id: &str,
) -> BrokerResult<()> {
    for ref_id in &instance.references {
        if ref_id == instance_id {
            continue;
        }
        if let Some(mut sibling) = repository.find(ref_id).await? {
            sibling.remove_reference(instance_id);
            repository.save(&sibling).await?;
        }
    }
    Ok(())
}
