//! Binding workflows.
//!
//! A binding mints one remote user identity on the bound instance's
//! physical resource and derives the credentials handed back to the
//! consumer. One workflow variant exists per resource kind; selection
//! happens once per request and the workflow value is used for exactly one
//! request.

mod bucket;
mod namespace;

use std::sync::Arc;

use osbroker_core::binding::{ServiceInstanceBinding, VolumeMount};
use osbroker_core::catalog::{Plan, ResourceKind, ServiceDefinition};
use osbroker_core::repository::InstanceRepository;
use osbroker_core::settings::Settings;
use serde_json::Value;

pub use bucket::BucketBindingWorkflow;
pub use namespace::NamespaceBindingWorkflow;

use crate::error::BrokerResult;
use crate::storage::StorageService;

/// Immutable context for one binding request.
#[derive(Debug, Clone)]
pub struct BindRequest {
    /// The owning instance.
    pub instance_id: String,
    /// The binding being created.
    pub binding_id: String,
    /// Resolved service definition.
    pub service: ServiceDefinition,
    /// Resolved plan.
    pub plan: Plan,
    /// Raw request parameters.
    pub parameters: Settings,
}

/// Result of creating a binding user: the generated secret and any volume
/// mounts provisioned alongside it.
#[derive(Debug, Clone)]
pub struct CreatedBindingUser {
    /// Freshly generated secret key.
    pub secret_key: String,
    /// Volume mounts, for filesystem-enabled bucket bindings.
    pub volume_mounts: Vec<VolumeMount>,
}

/// A binding workflow, selected once per request.
#[derive(Debug)]
pub enum BindingWorkflow {
    /// Bind to an object bucket.
    Bucket(BucketBindingWorkflow),
    /// Bind to a tenant namespace.
    Namespace(NamespaceBindingWorkflow),
}

impl BindingWorkflow {
    /// Select the workflow by the service definition's resource kind.
    #[must_use]
    pub fn for_kind(
        storage: Arc<StorageService>,
        repository: Arc<dyn InstanceRepository>,
        service: &ServiceDefinition,
    ) -> Self {
        match service.service_type {
            ResourceKind::Bucket => Self::Bucket(BucketBindingWorkflow::new(storage, repository)),
            ResourceKind::Namespace => {
                Self::Namespace(NamespaceBindingWorkflow::new(storage, repository))
            }
        }
    }

    /// Refuse the bind when a user already exists under the binding id.
    pub async fn check_if_user_exists(&self, request: &BindRequest) -> BrokerResult<()> {
        match self {
            Self::Bucket(wf) => wf.check_if_user_exists(request).await,
            Self::Namespace(wf) => wf.check_if_user_exists(request).await,
        }
    }

    /// Create the binding user and return its generated secret.
    pub async fn create_binding_user(
        &self,
        request: &BindRequest,
    ) -> BrokerResult<CreatedBindingUser> {
        match self {
            Self::Bucket(wf) => wf.create_binding_user(request).await,
            Self::Namespace(wf) => wf.create_binding_user(request).await,
        }
    }

    /// Build the credentials mapping returned to the consumer.
    pub async fn credentials(
        &self,
        request: &BindRequest,
        secret_key: &str,
    ) -> BrokerResult<Settings> {
        match self {
            Self::Bucket(wf) => wf.credentials(request, secret_key).await,
            Self::Namespace(wf) => wf.credentials(request, secret_key).await,
        }
    }

    /// Tear down the binding user and any associated export state.
    pub async fn remove_binding(&self, binding: &ServiceInstanceBinding) -> BrokerResult<()> {
        match self {
            Self::Bucket(wf) => wf.remove_binding(binding).await,
            Self::Namespace(wf) => wf.remove_binding(binding).await,
        }
    }
}

/// Credentials every binding carries: the prefixed binding identity and the
/// generated secret.
pub(crate) fn base_credentials(access_key: &str, secret_key: &str) -> Settings {
    let mut credentials = Settings::new();
    credentials.insert("accessKey".to_owned(), Value::String(access_key.to_owned()));
    credentials.insert("secretKey".to_owned(), Value::String(secret_key.to_owned()));
    credentials
}
