//! Bucket binding workflow.
//!
//! Bucket bindings add the binding user to the bucket's access list and,
//! for buckets without filesystem access, attach an S3 bucket policy.
//! Filesystem-enabled buckets use UNIX export permissions instead: when the
//! request carries mount/export parameters the workflow allocates a uid,
//! maps it to the user, ensures an NFS export, and returns a volume-mount
//! descriptor.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use osbroker_core::binding::{
    DeviceType, MountMode, ServiceInstanceBinding, SharedVolumeDevice, VolumeMount,
};
use osbroker_core::instance::ServiceInstance;
use osbroker_core::repository::InstanceRepository;
use osbroker_core::settings::{self, Settings};
use osbroker_gateway::GatewayError;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{BrokerError, BrokerResult};
use crate::naming::resource_name;
use crate::storage::StorageService;
use crate::urls::{Endpoint, s3_url};

use super::{BindRequest, CreatedBindingUser, base_credentials};

/// Volume driver handed back in mount descriptors.
const VOLUME_DRIVER: &str = "nfsv3driver";
/// Default container mount root, suffixed with the binding id.
const DEFAULT_MOUNT: &str = "/var/vcap/data";
/// Parameter naming the container mount path.
const MOUNT: &str = "mount";
/// Parameter naming the relative export sub-path.
const EXPORT: &str = "export";
/// Parameter carrying an explicit permission list.
const PERMISSIONS: &str = "permissions";
/// Parameter selecting path-style or virtual-host-style URLs.
const PATH_STYLE_ACCESS: &str = "path-style-access";

/// Binding workflow for object buckets.
pub struct BucketBindingWorkflow {
    storage: Arc<StorageService>,
    repository: Arc<dyn InstanceRepository>,
}

impl std::fmt::Debug for BucketBindingWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketBindingWorkflow").finish_non_exhaustive()
    }
}

impl BucketBindingWorkflow {
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

    /// Create the binding user, grant it bucket access, and provision the
    /// volume export when the bucket is filesystem-enabled and the request
    /// asks for a mount.
    pub async fn create_binding_user(
        &self,
        request: &BindRequest,
    ) -> BrokerResult<CreatedBindingUser> {
        let instance = self.find_instance(&request.instance_id).await?;
        let alias = instance_alias(&instance);
        let user_name = resource_name(&request.binding_id, &alias);

        let secret_key = self.storage.create_user(&user_name).await?;

        let permissions = permission_list(&request.parameters);
        self.storage
            .add_user_to_bucket(&instance.name, &user_name, permissions)
            .await?;

        let wants_mount = request.parameters.contains_key(EXPORT)
            || request.parameters.contains_key(MOUNT);
        let volume_mounts = if wants_mount && self.storage.bucket_file_enabled(&instance.name).await?
        {
            self.create_volume_export(request, &instance, &user_name)
                .await?
        } else {
            Vec::new()
        };

        Ok(CreatedBindingUser {
            secret_key,
            volume_mounts,
        })
    }

    /// Build the credentials mapping: access/secret keys, object endpoint,
    /// S3-style URL, addressing style, and the physical bucket name.
    pub async fn credentials(
        &self,
        request: &BindRequest,
        secret_key: &str,
    ) -> BrokerResult<Settings> {
        let instance = self.find_instance(&request.instance_id).await?;
        let alias = instance_alias(&instance);
        let access_key = self
            .storage
            .prefixed(&resource_name(&request.binding_id, &alias));
        let bucket = self.storage.prefixed(&instance.name);

        let mut credentials = base_credentials(&access_key, secret_key);

        let endpoint_url = self.storage.object_endpoint().to_owned();
        let endpoint = Endpoint::parse(&endpoint_url)?;
        let path_style =
            settings::bool_value(&request.parameters, PATH_STYLE_ACCESS).unwrap_or(true);

        credentials.insert("endpoint".to_owned(), Value::String(endpoint_url));
        credentials.insert(
            "s3Url".to_owned(),
            Value::String(s3_url(
                &endpoint,
                &access_key,
                secret_key,
                Some(&bucket),
                path_style,
            )),
        );
        credentials.insert(PATH_STYLE_ACCESS.to_owned(), Value::Bool(path_style));
        credentials.insert("bucket".to_owned(), Value::String(bucket));

        Ok(credentials)
    }

    /// Tear down the binding: best-effort uid-mapping removal, then access
    /// list removal and user deletion.
    pub async fn remove_binding(&self, binding: &ServiceInstanceBinding) -> BrokerResult<()> {
        let instance = self.find_instance(&binding.instance_id).await?;
        let alias = instance_alias(&instance);
        let user_name = resource_name(&binding.binding_id, &alias);

        if let Some(uid) = binding.mount_uid().and_then(|u| u.parse::<u32>().ok()) {
            // The mapping may already be gone; never fail the unbind for it.
            if let Err(e) = self.storage.delete_uid_mapping(&user_name, uid).await {
                warn!(binding_id = %binding.binding_id, uid, error = %e, "failed to delete uid mapping");
            }
        }

        self.storage
            .remove_user_from_bucket(&instance.name, &user_name)
            .await?;
        self.storage.delete_user(&user_name).await?;
        Ok(())
    }

    async fn find_instance(&self, instance_id: &str) -> BrokerResult<ServiceInstance> {
        self.repository
            .find(instance_id)
            .await?
            .ok_or_else(|| BrokerError::InstanceNotFound {
                instance_id: instance_id.to_owned(),
            })
    }

    async fn create_volume_export(
        &self,
        request: &BindRequest,
        instance: &ServiceInstance,
        user_name: &str,
    ) -> BrokerResult<Vec<VolumeMount>> {
        let uid = allocate_uid(&self.storage, user_name, uid_seed()).await?;

        let host = match self.storage.nfs_mount_host() {
            Some(host) if !host.is_empty() => host.to_owned(),
            _ => Endpoint::parse(self.storage.object_endpoint())?.host,
        };

        let export = settings::str_value(&request.parameters, EXPORT);
        info!(bucket = %instance.name, export = export.unwrap_or(""), "adding export to bucket");
        let absolute_path = self
            .storage
            .add_export_to_bucket(&instance.name, export)
            .await?;

        let mount_config = BTreeMap::from([
            ("source".to_owned(), format!("nfs://{host}{absolute_path}")),
            ("uid".to_owned(), uid.to_string()),
        ]);

        Ok(vec![VolumeMount {
            driver: VOLUME_DRIVER.to_owned(),
            container_dir: container_dir(&request.parameters, &request.binding_id),
            mode: MountMode::Rw,
            device_type: DeviceType::Shared,
            device: SharedVolumeDevice {
                volume_id: Uuid::new_v4().to_string(),
                mount_config,
            },
        }])
    }
}

/// Allocate an unused uid by probing the gateway, starting from `start` and
/// incrementing only on a uid-mapping conflict. Any other failure
/// propagates. The probe is best-effort, not a reservation: concurrent
/// binders may race for the same range and resolve through the conflict
/// signal.
pub(crate) async fn allocate_uid(
    storage: &StorageService,
    user_name: &str,
    start: u32,
) -> BrokerResult<u32> {
    let mut uid = start;
    loop {
        match storage.create_uid_mapping(user_name, uid).await {
            Ok(()) => return Ok(uid),
            Err(BrokerError::Gateway(GatewayError::UidAlreadyMapped { .. })) => uid += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Time-derived starting uid for the allocation probe.
fn uid_seed() -> u32 {
    2000 + u32::try_from(Utc::now().timestamp_millis().rem_euclid(8000)).unwrap_or(0)
}

/// The instance alias the physical bucket was provisioned under.
fn instance_alias(instance: &ServiceInstance) -> String {
    instance
        .service_settings
        .as_ref()
        .map(settings::instance_alias)
        .unwrap_or_default()
}

/// The caller-specified permission list, when present.
fn permission_list(parameters: &Settings) -> Option<Vec<String>> {
    parameters.get(PERMISSIONS).and_then(Value::as_array).map(|list| {
        list.iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect()
    })
}

/// The container mount path: the `mount` parameter when present and
/// non-empty, else the default root suffixed with the binding id.
fn container_dir(parameters: &Settings, binding_id: &str) -> String {
    match settings::str_value(parameters, MOUNT) {
        Some(mount) if !mount.is_empty() => mount.to_owned(),
        _ => format!("{DEFAULT_MOUNT}/{binding_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_default_container_dir_to_binding_id_suffix() {
        let params = Settings::new();
        assert_eq!(
            container_dir(&params, "binding-1"),
            "/var/vcap/data/binding-1"
        );
    }

    #[test]
    fn test_should_use_mount_parameter_for_container_dir() {
        let params = serde_json::json!({"mount": "/data/shared"})
            .as_object()
            .cloned()
            .unwrap_or_default();
        assert_eq!(container_dir(&params, "binding-1"), "/data/shared");
    }

    #[test]
    fn test_should_ignore_empty_mount_parameter() {
        let params = serde_json::json!({"mount": ""})
            .as_object()
            .cloned()
            .unwrap_or_default();
        assert_eq!(
            container_dir(&params, "binding-1"),
            "/var/vcap/data/binding-1"
        );
    }

    #[test]
    fn test_should_extract_permission_list() {
        let params = serde_json::json!({"permissions": ["read", "write"]})
            .as_object()
            .cloned()
            .unwrap_or_default();
        assert_eq!(
            permission_list(&params),
            Some(vec!["read".to_owned(), "write".to_owned()])
        );
        assert!(permission_list(&Settings::new()).is_none());
    }

    #[test]
    fn test_should_seed_uid_in_probe_range() {
        let seed = uid_seed();
        assert!((2000..10000).contains(&seed));
    }

    #[tokio::test]
    async fn test_should_probe_past_mapped_uids() {
        use osbroker_core::config::BrokerConfig;
        use osbroker_gateway::{InMemoryGateway, StorageGateway};

        let gateway = Arc::new(InMemoryGateway::new());
        let storage = StorageService::initialize(
            Arc::clone(&gateway) as Arc<dyn StorageGateway>,
            BrokerConfig::default(),
        )
        .await
        .expect("initialize storage");

        gateway.occupy_uid(5000, "someone-else");
        gateway.occupy_uid(5001, "someone-else");

        let uid = allocate_uid(&storage, "binding-1", 5000)
            .await
            .expect("allocate");
        assert_eq!(uid, 5002);
        assert_eq!(gateway.uid_mapping(5002).as_deref(), Some("broker-binding-1"));
    }
}
