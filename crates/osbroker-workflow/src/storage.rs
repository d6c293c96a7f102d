//! Storage-operations layer.
//!
//! [`StorageService`] sits between the workflows and the
//! [`StorageGateway`]: it resolves endpoints at startup, merges catalog
//! settings for each operation, applies quota and retention semantics, and
//! manages remote users, ACLs, uid mappings, and NFS exports. All resource
//! names it accepts are *unprefixed*; the configured prefix is applied here
//! and nowhere else.

use std::sync::Arc;

use osbroker_core::catalog::{Plan, ServiceDefinition};
use osbroker_core::config::BrokerConfig;
use osbroker_core::settings::{self, Settings};
use osbroker_gateway::{
    BaseUrlInfo, BucketCreate, BucketPolicy, BucketPolicyStatement, BucketUserAcl,
    NamespaceCreate, StorageGateway,
};
use tracing::{debug, info};

use crate::error::{BrokerError, BrokerResult};
use crate::naming;

/// Name of the base-URL entry preferred when none is configured.
const DEFAULT_BASE_URL: &str = "DefaultBaseUrl";

/// Storage-operations layer over the remote management gateway.
pub struct StorageService {
    gateway: Arc<dyn StorageGateway>,
    config: BrokerConfig,
    object_endpoint: String,
    replication_group_id: String,
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("object_endpoint", &self.object_endpoint)
            .field("replication_group_id", &self.replication_group_id)
            .finish_non_exhaustive()
    }
}

impl StorageService {
    /// Resolve startup state against the gateway and build the service.
    ///
    /// The object endpoint comes from the explicit configuration override
    /// when present, otherwise from the configured base-URL entry (or the
    /// gateway's default entry). The configured replication group is
    /// resolved to its id by name.
    pub async fn initialize(
        gateway: Arc<dyn StorageGateway>,
        config: BrokerConfig,
    ) -> BrokerResult<Self> {
        let object_endpoint = match &config.object_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => {
                let base_url = resolve_base_url(gateway.as_ref(), config.base_url.as_deref())
                    .await?;
                base_url.namespace_url(&config.namespace, false)
            }
        };

        let replication_group_id = gateway
            .list_replication_groups()
            .await?
            .into_iter()
            .find(|rg| rg.name == config.replication_group)
            .map(|rg| rg.id)
            .ok_or_else(|| {
                BrokerError::Initialization(format!(
                    "configured replication group not found: {}",
                    config.replication_group
                ))
            })?;

        info!(endpoint = %object_endpoint, "storage service initialized");

        Ok(Self {
            gateway,
            config,
            object_endpoint,
            replication_group_id,
        })
    }

    /// The resolved base object endpoint.
    #[must_use]
    pub fn object_endpoint(&self) -> &str {
        &self.object_endpoint
    }

    /// The configured NFS mount host, if any.
    #[must_use]
    pub fn nfs_mount_host(&self) -> Option<&str> {
        self.config.nfs_mount_host.as_deref()
    }

    /// The broker configuration.
    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Apply the configured prefix to an unprefixed resource name.
    #[must_use]
    pub fn prefixed(&self, name: &str) -> String {
        naming::prefixed(&self.config.prefix, name)
    }

    // -- buckets ----------------------------------------------------------

    /// Create a bucket with the merged settings and apply optional quota and
    /// default retention. Returns the settings actually applied.
    pub async fn create_bucket(
        &self,
        instance_id: &str,
        name: &str,
        service: &ServiceDefinition,
        plan: &Plan,
        parameters: &Settings,
    ) -> BrokerResult<Settings> {
        let physical = self.prefixed(name);
        info!(bucket = %physical, "creating bucket");

        if self.gateway.bucket_exists(&physical, &self.config.namespace).await? {
            return Err(BrokerError::InstanceExists {
                instance_id: instance_id.to_owned(),
                service_id: service.id.clone(),
            });
        }

        let merged = service.resolve_settings(plan, parameters);
        self.gateway
            .create_bucket(&BucketCreate {
                name: physical.clone(),
                namespace: self.config.namespace.clone(),
                replication_group: self.replication_group_id.clone(),
                settings: merged.clone(),
            })
            .await?;

        if let Some((limit, warn)) = settings::quota(&merged) {
            info!(bucket = %physical, limit, warn, "applying quota");
            self.gateway
                .set_bucket_quota(&physical, &self.config.namespace, limit, warn)
                .await?;
        }

        if let Some(period) = settings::int_value(&merged, settings::DEFAULT_RETENTION) {
            info!(bucket = %physical, period, "applying retention policy");
            self.gateway
                .set_bucket_retention(&physical, &self.config.namespace, period)
                .await?;
        }

        Ok(merged)
    }

    /// Recompute the bucket quota from the merged settings. Both limit and
    /// warn unset deletes the quota and drops the `quota` key from the
    /// returned settings.
    pub async fn change_bucket_plan(
        &self,
        name: &str,
        service: &ServiceDefinition,
        plan: &Plan,
        parameters: &Settings,
    ) -> BrokerResult<Settings> {
        let physical = self.prefixed(name);
        let mut merged = service.resolve_settings(plan, parameters);

        let (limit, warn) = settings::quota(&merged).unwrap_or((settings::UNSET, settings::UNSET));
        if limit == settings::UNSET && warn == settings::UNSET {
            merged.remove(settings::QUOTA);
            debug!(bucket = %physical, "deleting quota");
            self.gateway
                .delete_bucket_quota(&physical, &self.config.namespace)
                .await?;
        } else {
            debug!(bucket = %physical, limit, warn, "updating quota");
            self.gateway
                .set_bucket_quota(&physical, &self.config.namespace, limit, warn)
                .await?;
        }

        Ok(merged)
    }

    /// Delete a bucket.
    pub async fn delete_bucket(&self, name: &str) -> BrokerResult<()> {
        let physical = self.prefixed(name);
        info!(bucket = %physical, "deleting bucket");
        self.gateway
            .delete_bucket(&physical, &self.config.namespace)
            .await?;
        Ok(())
    }

    /// Whether the bucket has filesystem access enabled.
    pub async fn bucket_file_enabled(&self, name: &str) -> BrokerResult<bool> {
        let info = self
            .gateway
            .get_bucket_info(&self.prefixed(name), &self.config.namespace)
            .await?;
        Ok(info.file_system_enabled)
    }

    // -- namespaces -------------------------------------------------------

    /// Create a namespace with the merged settings and apply optional quota
    /// and retention classes. Returns the settings actually applied.
    pub async fn create_namespace(
        &self,
        instance_id: &str,
        name: &str,
        service: &ServiceDefinition,
        plan: &Plan,
        parameters: &Settings,
    ) -> BrokerResult<Settings> {
        let physical = self.prefixed(name);
        info!(namespace = %physical, "creating namespace");

        if self.gateway.namespace_exists(&physical).await? {
            return Err(BrokerError::InstanceExists {
                instance_id: instance_id.to_owned(),
                service_id: service.id.clone(),
            });
        }

        let merged = service.resolve_settings(plan, parameters);
        self.gateway
            .create_namespace(&NamespaceCreate {
                name: physical.clone(),
                replication_group: self.replication_group_id.clone(),
                settings: merged.clone(),
            })
            .await?;

        if let Some((limit, warn)) = settings::quota(&merged) {
            self.gateway
                .set_namespace_quota(&physical, limit, warn)
                .await?;
        }

        for (class, period) in settings::retention_classes(&merged) {
            self.gateway
                .create_retention_class(&physical, &class, period)
                .await?;
        }

        Ok(merged)
    }

    /// Update a namespace from the merged settings, reconciling retention
    /// classes: unknown classes are created, known classes are updated, and
    /// an unset period deletes the class (and drops the `retention` key from
    /// the returned settings).
    pub async fn change_namespace_plan(
        &self,
        name: &str,
        service: &ServiceDefinition,
        plan: &Plan,
        parameters: &Settings,
    ) -> BrokerResult<Settings> {
        let physical = self.prefixed(name);
        let mut merged = service.resolve_settings(plan, parameters);

        self.gateway.update_namespace(&physical, &merged).await?;

        for (class, period) in settings::retention_classes(&merged) {
            if self.gateway.retention_class_exists(&physical, &class).await? {
                if period == settings::UNSET {
                    debug!(namespace = %physical, class = %class, "deleting retention class");
                    self.gateway
                        .delete_retention_class(&physical, &class)
                        .await?;
                    merged.remove(settings::RETENTION);
                } else {
                    self.gateway
                        .update_retention_class(&physical, &class, period)
                        .await?;
                }
            } else {
                self.gateway
                    .create_retention_class(&physical, &class, period)
                    .await?;
            }
        }

        Ok(merged)
    }

    /// Delete a namespace.
    pub async fn delete_namespace(&self, name: &str) -> BrokerResult<()> {
        let physical = self.prefixed(name);
        info!(namespace = %physical, "deleting namespace");
        self.gateway.delete_namespace(&physical).await?;
        Ok(())
    }

    // -- users ------------------------------------------------------------

    /// Whether a remote user exists under the given unprefixed name.
    pub async fn user_exists(&self, name: &str) -> BrokerResult<bool> {
        Ok(self
            .gateway
            .user_exists(&self.prefixed(name), &self.config.namespace)
            .await?)
    }

    /// Create a remote user in the broker's management namespace and return
    /// a freshly generated secret key.
    pub async fn create_user(&self, name: &str) -> BrokerResult<String> {
        let physical = self.prefixed(name);
        self.gateway
            .create_user(&physical, &self.config.namespace)
            .await?;
        let secret = self.gateway.create_user_secret(&physical).await?;
        Ok(secret.secret_key)
    }

    /// Create a remote user scoped under a provisioned namespace and return
    /// a freshly generated secret key.
    pub async fn create_namespace_user(
        &self,
        name: &str,
        namespace_name: &str,
    ) -> BrokerResult<String> {
        let physical = self.prefixed(name);
        self.gateway
            .create_user(&physical, &self.prefixed(namespace_name))
            .await?;
        let secret = self.gateway.create_user_secret(&physical).await?;
        Ok(secret.secret_key)
    }

    /// Delete a remote user.
    pub async fn delete_user(&self, name: &str) -> BrokerResult<()> {
        self.gateway.delete_user(&self.prefixed(name)).await?;
        Ok(())
    }

    /// Add a user to a bucket's access list. Without explicit permissions
    /// the user gets full control. Buckets without filesystem access also
    /// get an S3 bucket policy granting the user full protocol rights;
    /// filesystem-enabled buckets use UNIX export permissions instead.
    pub async fn add_user_to_bucket(
        &self,
        bucket_name: &str,
        user_name: &str,
        permissions: Option<Vec<String>>,
    ) -> BrokerResult<()> {
        let bucket = self.prefixed(bucket_name);
        let user = self.prefixed(user_name);
        let permissions = permissions.unwrap_or_else(|| vec!["full_control".to_owned()]);

        let mut acl = self
            .gateway
            .get_bucket_acl(&bucket, &self.config.namespace)
            .await?;
        acl.user_access.push(BucketUserAcl {
            user: user.clone(),
            permissions,
        });
        self.gateway
            .update_bucket_acl(&bucket, &self.config.namespace, &acl)
            .await?;

        if !self.bucket_file_enabled(bucket_name).await? {
            let policy = BucketPolicy {
                version: "2012-10-17".to_owned(),
                id: "DefaultBrokerBucketPolicy".to_owned(),
                statements: vec![BucketPolicyStatement {
                    sid: "DefaultAllowTotalAccess".to_owned(),
                    effect: "Allow".to_owned(),
                    principal: user,
                    actions: vec!["s3:*".to_owned()],
                    resources: vec![bucket.clone()],
                }],
            };
            self.gateway
                .set_bucket_policy(&bucket, &self.config.namespace, &policy)
                .await?;
        }

        Ok(())
    }

    /// Remove a user from a bucket's access list.
    pub async fn remove_user_from_bucket(
        &self,
        bucket_name: &str,
        user_name: &str,
    ) -> BrokerResult<()> {
        let bucket = self.prefixed(bucket_name);
        let user = self.prefixed(user_name);

        let mut acl = self
            .gateway
            .get_bucket_acl(&bucket, &self.config.namespace)
            .await?;
        acl.user_access.retain(|entry| entry.user != user);
        self.gateway
            .update_bucket_acl(&bucket, &self.config.namespace, &acl)
            .await?;
        Ok(())
    }

    // -- uid mappings / NFS ----------------------------------------------

    /// Map a UNIX uid to a binding user.
    pub async fn create_uid_mapping(&self, user_name: &str, uid: u32) -> BrokerResult<()> {
        self.gateway
            .create_uid_mapping(&self.prefixed(user_name), uid, &self.config.namespace)
            .await?;
        Ok(())
    }

    /// Remove a uid-to-user mapping.
    pub async fn delete_uid_mapping(&self, user_name: &str, uid: u32) -> BrokerResult<()> {
        self.gateway
            .delete_uid_mapping(&self.prefixed(user_name), uid, &self.config.namespace)
            .await?;
        Ok(())
    }

    /// Ensure an NFS export exists for a bucket at an optional relative
    /// sub-path and return the absolute export path.
    pub async fn add_export_to_bucket(
        &self,
        bucket_name: &str,
        relative_path: Option<&str>,
    ) -> BrokerResult<String> {
        let relative = relative_path.unwrap_or_default();
        let absolute = format!(
            "/{}/{}/{relative}",
            self.config.namespace,
            self.prefixed(bucket_name)
        );
        if self.gateway.list_nfs_exports(&absolute).await?.is_empty() {
            info!(path = %absolute, "creating nfs export");
            self.gateway.create_nfs_export(&absolute).await?;
        }
        Ok(absolute)
    }

    // -- endpoints --------------------------------------------------------

    /// Resolve the endpoint URL for a provisioned namespace, honoring
    /// `base-url` and `use-ssl` parameters merged through the standard
    /// precedence.
    pub async fn namespace_url(
        &self,
        namespace_name: &str,
        service: &ServiceDefinition,
        plan: &Plan,
        parameters: &Settings,
    ) -> BrokerResult<String> {
        let merged = service.resolve_settings(plan, parameters);
        let base_url_name = settings::str_value(&merged, "base-url")
            .map(str::to_owned)
            .or_else(|| self.config.base_url.clone());
        let use_ssl = settings::bool_value(&merged, "use-ssl").unwrap_or(false);

        let base_url = resolve_base_url(self.gateway.as_ref(), base_url_name.as_deref()).await?;
        Ok(base_url.namespace_url(&self.prefixed(namespace_name), use_ssl))
    }
}

/// Resolve a base-URL entry by name, or pick the gateway's default entry
/// (the one named `DefaultBaseUrl`, else the first listed).
async fn resolve_base_url(
    gateway: &dyn StorageGateway,
    name: Option<&str>,
) -> BrokerResult<BaseUrlInfo> {
    let entries = gateway.list_base_urls().await?;
    if entries.is_empty() {
        return Err(BrokerError::Initialization(
            "no object endpoint or base URL available".to_owned(),
        ));
    }

    let id = match name {
        Some(name) => entries
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.id.clone())
            .ok_or_else(|| BrokerError::BaseUrlNotFound(name.to_owned()))?,
        None => entries
            .iter()
            .find(|b| b.name == DEFAULT_BASE_URL)
            .unwrap_or(&entries[0])
            .id
            .clone(),
    };

    Ok(gateway.base_url_info(&id).await?)
}
