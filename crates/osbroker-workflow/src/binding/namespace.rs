//! Namespace binding workflow.
//!
//! Namespace bindings create the remote user scoped under the provisioned
//! namespace and resolve a namespace-specific endpoint, which may depend on
//! caller `base-url` and `use-ssl` parameters.

use std::sync::Arc;

use osbroker_core::binding::ServiceInstanceBinding;
use osbroker_core::instance::ServiceInstance;
use osbroker_core::repository::InstanceRepository;
use osbroker_core::settings::{self, Settings};
use serde_json::Value;

use crate::error::{BrokerError, BrokerResult};
use crate::naming::resource_name;
use crate::storage::StorageService;
use crate::urls::{Endpoint, s3_url};

use super::{BindRequest, CreatedBindingUser, base_credentials};

/// Parameter selecting path-style or virtual-host-style URLs.
const PATH_STYLE_ACCESS: &str = "path-style-access";

/// Binding workflow for tenant namespaces.
pub struct NamespaceBindingWorkflow {
    storage: Arc<StorageService>,
    repository: Arc<dyn InstanceRepository>,
}

impl std::fmt::Debug for NamespaceBindingWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceBindingWorkflow")
            .finish_non_exhaustive()
    }
}

impl NamespaceBindingWorkflow {
    /// Build the workflow.
    #[must_use]
    pub fn new(storage: Arc<StorageService>, repository: Arc<dyn InstanceRepository>) -> Self {
        Self {
            storage,
            repository,
        }
    }

    /// Refuse the bind when a user already exists under the binding id.
    pub async fn check_if_user_exists(&self, request: &BindRequest) -> BrokerResult<()> {
        let alias = settings::instance_alias(&request.parameters);
        let user_name = resource_name(&request.binding_id, &alias);
        if self.storage.user_exists(&user_name).await? {
            return Err(BrokerError::BindingExists {
                instance_id: request.instance_id.clone(),
                binding_id: request.binding_id.clone(),
            });
        }
        Ok(())
    }

    /// Create the binding user scoped under the bound namespace.
    pub async fn create_binding_user(
        &self,
        request: &BindRequest,
    ) -> BrokerResult<CreatedBindingUser> {
        let instance = self.find_instance(&request.instance_id).await?;
        let alias = settings::instance_alias(&request.parameters);
        let user_name = resource_name(&request.binding_id, &alias);

        let secret_key = self
            .storage
            .create_namespace_user(&user_name, &instance.name)
            .await?;

        Ok(CreatedBindingUser {
            secret_key,
            volume_mounts: Vec::new(),
        })
    }

    /// Build the credentials mapping with the namespace-specific endpoint.
    pub async fn credentials(
        &self,
        request: &BindRequest,
        secret_key: &str,
    ) -> BrokerResult<Settings> {
        let instance = self.find_instance(&request.instance_id).await?;
        let alias = settings::instance_alias(&request.parameters);
        let access_key = self
            .storage
            .prefixed(&resource_name(&request.binding_id, &alias));

        let mut credentials = base_credentials(&access_key, secret_key);

        let endpoint_url = self
            .storage
            .namespace_url(
                &instance.name,
                &request.service,
                &request.plan,
                &request.parameters,
            )
            .await?;
        let endpoint = Endpoint::parse(&endpoint_url)?;
        let path_style =
            settings::bool_value(&request.parameters, PATH_STYLE_ACCESS).unwrap_or(true);

        credentials.insert("endpoint".to_owned(), Value::String(endpoint_url));
        credentials.insert(
            "s3Url".to_owned(),
            Value::String(s3_url(&endpoint, &access_key, secret_key, None, path_style)),
        );
        credentials.insert(PATH_STYLE_ACCESS.to_owned(), Value::Bool(path_style));

        Ok(credentials)
    }

    /// Tear down the binding by deleting the namespace user.
    pub async fn remove_binding(&self, binding: &ServiceInstanceBinding) -> BrokerResult<()> {
        let alias = settings::instance_alias(&binding.parameters);
        let user_name = resource_name(&binding.binding_id, &alias);
        self.storage.delete_user(&user_name).await
    }

    async fn find_instance(&self, instance_id: &str) -> BrokerResult<ServiceInstance> {
        self.repository
            .find(instance_id)
            .await?
            .ok_or_else(|| BrokerError::InstanceNotFound {
                instance_id: instance_id.to_owned(),
            })
    }
}
