//! Remote-connection provisioning workflow.
//!
//! A remote connection attaches a new logical instance to another tenant's
//! existing physical resource instead of creating one. The new local record
//! carries no service settings; they are inherited through the shared
//! physical resource.

use std::sync::Arc;

use osbroker_core::instance::ServiceInstance;
use osbroker_core::repository::InstanceRepository;
use osbroker_core::settings::{self, Settings};
use serde_json::Value;
use tracing::info;

use crate::error::{BrokerError, BrokerResult, SETTINGS_MISMATCH};

use super::ProvisionRequest;

/// Credentials presented by a remote-connection create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RemoteConnectionParams {
    access_key: String,
    secret_key: String,
    instance_id: String,
}

impl RemoteConnectionParams {
    /// Extract and validate the `remote_connection` parameter.
    fn from_parameters(parameters: &Settings) -> BrokerResult<Self> {
        let object = parameters
            .get(settings::REMOTE_CONNECTION)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                BrokerError::Validation("malformed remote_connection parameter".to_owned())
            })?;

        let field = |key: &str| -> BrokerResult<String> {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| {
                    BrokerError::Validation(format!(
                        "remote_connection parameter is missing {key}"
                    ))
                })
        };

        Ok(Self {
            access_key: field("accessKey")?,
            secret_key: field("secretKey")?,
            instance_id: field("instanceId")?,
        })
    }
}

/// Provisioning workflow attaching to a remotely owned resource.
pub struct RemoteConnectionInstanceWorkflow {
    repository: Arc<dyn InstanceRepository>,
}

impl std::fmt::Debug for RemoteConnectionInstanceWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConnectionInstanceWorkflow")
            .finish_non_exhaustive()
    }
}

impl RemoteConnectionInstanceWorkflow {
    /// Build the workflow.
    #[must_use]
    pub fn new(repository: Arc<dyn InstanceRepository>) -> Self {
        Self { repository }
    }

    /// Attach the new local instance to the remote instance's physical
    /// resource.
    ///
    /// Fails with [`BrokerError::RemoteInstanceNotFound`] when the remote
    /// instance is absent and with a validation error when the presented
    /// credentials are rejected or the effective settings of the local
    /// request differ from the remote instance's stored settings. Nothing is
    /// persisted on failure.
    pub async fn create(&self, request: &ProvisionRequest) -> BrokerResult<ServiceInstance> {
        let remote = RemoteConnectionParams::from_parameters(&request.parameters)?;

        let mut remote_instance = self
            .repository
            .find(&remote.instance_id)
            .await?
            .ok_or(BrokerError::RemoteInstanceNotFound)?;

        if !remote_instance.remote_connection_keys.is_empty()
            && !remote_instance.remote_connection_key_valid(&remote.access_key, &remote.secret_key)
        {
            return Err(BrokerError::Validation(
                "invalid remote connection credentials".to_owned(),
            ));
        }

        // Both tenants must be promised the same storage guarantees.
        let local_settings = request
            .service
            .resolve_settings(&request.plan, &request.parameters);
        if remote_instance.service_settings.as_ref() != Some(&local_settings) {
            return Err(BrokerError::Validation(SETTINGS_MISMATCH.to_owned()));
        }

        remote_instance.add_reference(&request.instance_id);
        self.repository.save(&remote_instance).await?;

        info!(
            instance_id = %request.instance_id,
            remote_instance_id = %remote.instance_id,
            "attached remote connection"
        );

        let mut local = ServiceInstance::new(
            &request.instance_id,
            &request.service.id,
            &request.plan.id,
            "",
        );
        local.name = remote_instance.name.clone();
        local.references = remote_instance.references.clone();
        Ok(local)
    }

    /// Plan changes are not supported for remote connections.
    pub fn change_plan(&self) -> BrokerResult<Settings> {
        Err(BrokerError::Unsupported(
            "plan change is not supported for remote-connection instances".to_owned(),
        ))
    }

    /// Deletes are not supported for remote connections.
    pub fn delete(&self) -> BrokerResult<()> {
        Err(BrokerError::Unsupported(
            "delete is not supported for remote-connection instances".to_owned(),
        ))
    }
}
