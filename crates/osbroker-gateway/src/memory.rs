//! In-memory gateway implementation.
//!
//! [`InMemoryGateway`] implements the full [`StorageGateway`] contract over
//! in-process state. Workflow tests and local development run against it;
//! nothing in the broker layers above can tell it apart from a remote
//! management service.
//!
//! # Thread Safety
//!
//! All tables are `DashMap`s; per-resource mutable fields sit behind
//! `parking_lot::RwLock`. No external locking is required.

use std::collections::BTreeMap;

use base64::Engine;
use dashmap::DashMap;
use parking_lot::RwLock;
use rand::RngExt;
use tracing::{debug, info};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::StorageGateway;
use crate::types::{
    BaseUrl, BaseUrlInfo, BucketAcl, BucketCreate, BucketInfo, BucketPolicy, GatewaySettings,
    NamespaceCreate, NfsExport, ReplicationGroup, UserSecret,
};

/// Settings key that marks a bucket as filesystem-accessible.
const FILE_ACCESSIBLE: &str = "file-accessible";

/// Per-bucket state.
#[derive(Debug)]
struct BucketState {
    namespace: String,
    file_system_enabled: bool,
    quota: RwLock<Option<(i64, i64)>>,
    retention: RwLock<Option<i64>>,
    acl: RwLock<BucketAcl>,
    policy: RwLock<Option<BucketPolicy>>,
}

/// Per-namespace state.
#[derive(Debug)]
struct NamespaceState {
    settings: RwLock<GatewaySettings>,
    quota: RwLock<Option<(i64, i64)>>,
    retention_classes: RwLock<BTreeMap<String, i64>>,
}

/// Per-user state.
#[derive(Debug)]
struct UserState {
    namespace: String,
    secrets: RwLock<Vec<String>>,
}

/// In-memory implementation of the management contract.
pub struct InMemoryGateway {
    buckets: DashMap<String, BucketState>,
    namespaces: DashMap<String, NamespaceState>,
    users: DashMap<String, UserState>,
    uid_mappings: DashMap<u32, String>,
    nfs_exports: DashMap<String, NfsExport>,
    base_urls: Vec<BaseUrlInfo>,
    replication_groups: Vec<ReplicationGroup>,
}

impl std::fmt::Debug for InMemoryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGateway")
            .field("bucket_count", &self.buckets.len())
            .field("namespace_count", &self.namespaces.len())
            .field("user_count", &self.users.len())
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    /// Create a gateway with a default base URL (`DefaultBaseUrl` on
    /// `127.0.0.1`) and a default replication group (`rg1`).
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
            namespaces: DashMap::new(),
            users: DashMap::new(),
            uid_mappings: DashMap::new(),
            nfs_exports: DashMap::new(),
            base_urls: vec![BaseUrlInfo {
                id: "urn:baseurl:1".to_owned(),
                name: "DefaultBaseUrl".to_owned(),
                host: "127.0.0.1".to_owned(),
            }],
            replication_groups: vec![ReplicationGroup {
                id: "urn:rg:1".to_owned(),
                name: "rg1".to_owned(),
            }],
        }
    }

    /// Replace the base-URL catalog.
    #[must_use]
    pub fn with_base_url(mut self, name: impl Into<String>, host: impl Into<String>) -> Self {
        self.base_urls = vec![BaseUrlInfo {
            id: "urn:baseurl:1".to_owned(),
            name: name.into(),
            host: host.into(),
        }];
        self
    }

    /// Replace the replication-group catalog.
    #[must_use]
    pub fn with_replication_group(mut self, name: impl Into<String>) -> Self {
        self.replication_groups = vec![ReplicationGroup {
            id: "urn:rg:1".to_owned(),
            name: name.into(),
        }];
        self
    }

    /// Pre-occupy a uid, as another tenant's mapping would.
    pub fn occupy_uid(&self, uid: u32, user: impl Into<String>) {
        self.uid_mappings.insert(uid, user.into());
    }

    /// The user a uid is mapped to, if any.
    #[must_use]
    pub fn uid_mapping(&self, uid: u32) -> Option<String> {
        self.uid_mappings.get(&uid).map(|u| u.value().clone())
    }

    /// Current quota of a bucket, if set.
    #[must_use]
    pub fn bucket_quota(&self, name: &str) -> Option<(i64, i64)> {
        self.buckets.get(name).and_then(|b| *b.quota.read())
    }

    /// Current default retention of a bucket, if set.
    #[must_use]
    pub fn bucket_retention(&self, name: &str) -> Option<i64> {
        self.buckets.get(name).and_then(|b| *b.retention.read())
    }

    /// Current policy of a bucket, if set.
    #[must_use]
    pub fn bucket_policy(&self, name: &str) -> Option<BucketPolicy> {
        self.buckets.get(name).and_then(|b| b.policy.read().clone())
    }

    /// Current retention classes of a namespace.
    #[must_use]
    pub fn namespace_retention_classes(&self, name: &str) -> BTreeMap<String, i64> {
        self.namespaces
            .get(name)
            .map(|ns| ns.retention_classes.read().clone())
            .unwrap_or_default()
    }

    /// Whether an NFS export exists at a path.
    #[must_use]
    pub fn has_nfs_export(&self, path: &str) -> bool {
        self.nfs_exports.contains_key(path)
    }

    fn bucket(
        &self,
        name: &str,
    ) -> GatewayResult<dashmap::mapref::one::Ref<'_, String, BucketState>> {
        self.buckets.get(name).ok_or_else(|| GatewayError::NotFound {
            resource: format!("bucket {name}"),
        })
    }

    fn namespace(
        &self,
        name: &str,
    ) -> GatewayResult<dashmap::mapref::one::Ref<'_, String, NamespaceState>> {
        self.namespaces
            .get(name)
            .ok_or_else(|| GatewayError::NotFound {
                resource: format!("namespace {name}"),
            })
    }
}

/// Generate a random secret key (URL-safe base64 of 24 random bytes).
fn generate_secret_key() -> String {
    let mut rng = rand::rng();
    let mut buf = [0u8; 24];
    rng.fill(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

#[async_trait::async_trait]
impl StorageGateway for InMemoryGateway {
    async fn bucket_exists(&self, name: &str, _namespace: &str) -> GatewayResult<bool> {
        Ok(self.buckets.contains_key(name))
    }

    async fn create_bucket(&self, request: &BucketCreate) -> GatewayResult<()> {
        if self.buckets.contains_key(&request.name) {
            return Err(GatewayError::AlreadyExists {
                resource: format!("bucket {}", request.name),
            });
        }
        let file_system_enabled = request
            .settings
            .get(FILE_ACCESSIBLE)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        self.buckets.insert(
            request.name.clone(),
            BucketState {
                namespace: request.namespace.clone(),
                file_system_enabled,
                quota: RwLock::new(None),
                retention: RwLock::new(None),
                acl: RwLock::new(BucketAcl::default()),
                policy: RwLock::new(None),
            },
        );
        info!(bucket = %request.name, namespace = %request.namespace, "bucket created");
        Ok(())
    }

    async fn delete_bucket(&self, name: &str, _namespace: &str) -> GatewayResult<()> {
        self.buckets
            .remove(name)
            .ok_or_else(|| GatewayError::NotFound {
                resource: format!("bucket {name}"),
            })?;
        info!(bucket = %name, "bucket deleted");
        Ok(())
    }

    async fn get_bucket_info(&self, name: &str, _namespace: &str) -> GatewayResult<BucketInfo> {
        let bucket = self.bucket(name)?;
        Ok(BucketInfo {
            name: name.to_owned(),
            namespace: bucket.namespace.clone(),
            file_system_enabled: bucket.file_system_enabled,
        })
    }

    async fn set_bucket_quota(
        &self,
        name: &str,
        _namespace: &str,
        limit: i64,
        warn: i64,
    ) -> GatewayResult<()> {
        let bucket = self.bucket(name)?;
        *bucket.quota.write() = Some((limit, warn));
        debug!(bucket = %name, limit, warn, "bucket quota set");
        Ok(())
    }

    async fn delete_bucket_quota(&self, name: &str, _namespace: &str) -> GatewayResult<()> {
        let bucket = self.bucket(name)?;
        *bucket.quota.write() = None;
        debug!(bucket = %name, "bucket quota deleted");
        Ok(())
    }

    async fn set_bucket_retention(
        &self,
        name: &str,
        _namespace: &str,
        period: i64,
    ) -> GatewayResult<()> {
        let bucket = self.bucket(name)?;
        *bucket.retention.write() = Some(period);
        Ok(())
    }

    async fn get_bucket_acl(&self, name: &str, _namespace: &str) -> GatewayResult<BucketAcl> {
        Ok(self.bucket(name)?.acl.read().clone())
    }

    async fn update_bucket_acl(
        &self,
        name: &str,
        _namespace: &str,
        acl: &BucketAcl,
    ) -> GatewayResult<()> {
        let bucket = self.bucket(name)?;
        *bucket.acl.write() = acl.clone();
        Ok(())
    }

    async fn set_bucket_policy(
        &self,
        name: &str,
        _namespace: &str,
        policy: &BucketPolicy,
    ) -> GatewayResult<()> {
        let bucket = self.bucket(name)?;
        *bucket.policy.write() = Some(policy.clone());
        Ok(())
    }

    async fn namespace_exists(&self, name: &str) -> GatewayResult<bool> {
        Ok(self.namespaces.contains_key(name))
    }

    async fn create_namespace(&self, request: &NamespaceCreate) -> GatewayResult<()> {
        if self.namespaces.contains_key(&request.name) {
            return Err(GatewayError::AlreadyExists {
                resource: format!("namespace {}", request.name),
            });
        }
        self.namespaces.insert(
            request.name.clone(),
            NamespaceState {
                settings: RwLock::new(request.settings.clone()),
                quota: RwLock::new(None),
                retention_classes: RwLock::new(BTreeMap::new()),
            },
        );
        info!(namespace = %request.name, "namespace created");
        Ok(())
    }

    async fn update_namespace(&self, name: &str, settings: &GatewaySettings) -> GatewayResult<()> {
        let ns = self.namespace(name)?;
        *ns.settings.write() = settings.clone();
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> GatewayResult<()> {
        self.namespaces
            .remove(name)
            .ok_or_else(|| GatewayError::NotFound {
                resource: format!("namespace {name}"),
            })?;
        info!(namespace = %name, "namespace deleted");
        Ok(())
    }

    async fn set_namespace_quota(&self, name: &str, limit: i64, warn: i64) -> GatewayResult<()> {
        let ns = self.namespace(name)?;
        *ns.quota.write() = Some((limit, warn));
        Ok(())
    }

    async fn retention_class_exists(&self, namespace: &str, class: &str) -> GatewayResult<bool> {
        Ok(self
            .namespace(namespace)?
            .retention_classes
            .read()
            .contains_key(class))
    }

    async fn create_retention_class(
        &self,
        namespace: &str,
        class: &str,
        period: i64,
    ) -> GatewayResult<()> {
        let ns = self.namespace(namespace)?;
        ns.retention_classes
            .write()
            .insert(class.to_owned(), period);
        Ok(())
    }

    async fn update_retention_class(
        &self,
        namespace: &str,
        class: &str,
        period: i64,
    ) -> GatewayResult<()> {
        let ns = self.namespace(namespace)?;
        let mut classes = ns.retention_classes.write();
        if !classes.contains_key(class) {
            return Err(GatewayError::NotFound {
                resource: format!("retention class {class}"),
            });
        }
        classes.insert(class.to_owned(), period);
        Ok(())
    }

    async fn delete_retention_class(&self, namespace: &str, class: &str) -> GatewayResult<()> {
        let ns = self.namespace(namespace)?;
        ns.retention_classes.write().remove(class);
        Ok(())
    }

    async fn user_exists(&self, name: &str, _namespace: &str) -> GatewayResult<bool> {
        Ok(self.users.contains_key(name))
    }

    async fn create_user(&self, name: &str, namespace: &str) -> GatewayResult<()> {
        if self.users.contains_key(name) {
            return Err(GatewayError::AlreadyExists {
                resource: format!("user {name}"),
            });
        }
        self.users.insert(
            name.to_owned(),
            UserState {
                namespace: namespace.to_owned(),
                secrets: RwLock::new(Vec::new()),
            },
        );
        debug!(user = %name, namespace = %namespace, "user created");
        Ok(())
    }

    async fn delete_user(&self, name: &str) -> GatewayResult<()> {
        self.users
            .remove(name)
            .ok_or_else(|| GatewayError::NotFound {
                resource: format!("user {name}"),
            })?;
        // Drop any uid mappings pointing at the removed user.
        self.uid_mappings.retain(|_, mapped| mapped != name);
        debug!(user = %name, "user deleted");
        Ok(())
    }

    async fn create_user_secret(&self, name: &str) -> GatewayResult<UserSecret> {
        let user = self.users.get(name).ok_or_else(|| GatewayError::NotFound {
            resource: format!("user {name}"),
        })?;
        let secret_key = generate_secret_key();
        user.secrets.write().push(secret_key.clone());
        Ok(UserSecret { secret_key })
    }

    async fn create_uid_mapping(
        &self,
        user: &str,
        uid: u32,
        _namespace: &str,
    ) -> GatewayResult<()> {
        use dashmap::mapref::entry::Entry;

        match self.uid_mappings.entry(uid) {
            Entry::Occupied(_) => Err(GatewayError::UidAlreadyMapped { uid }),
            Entry::Vacant(entry) => {
                entry.insert(user.to_owned());
                debug!(user = %user, uid, "uid mapping created");
                Ok(())
            }
        }
    }

    async fn delete_uid_mapping(
        &self,
        user: &str,
        uid: u32,
        _namespace: &str,
    ) -> GatewayResult<()> {
        let removed = self
            .uid_mappings
            .remove_if(&uid, |_, mapped| mapped == user);
        if removed.is_none() {
            return Err(GatewayError::NotFound {
                resource: format!("uid mapping {uid}"),
            });
        }
        Ok(())
    }

    async fn list_nfs_exports(&self, path: &str) -> GatewayResult<Vec<NfsExport>> {
        Ok(self
            .nfs_exports
            .get(path)
            .map(|e| vec![e.value().clone()])
            .unwrap_or_default())
    }

    async fn create_nfs_export(&self, path: &str) -> GatewayResult<()> {
        self.nfs_exports.insert(
            path.to_owned(),
            NfsExport {
                path: path.to_owned(),
            },
        );
        info!(path = %path, "nfs export created");
        Ok(())
    }

    async fn list_base_urls(&self) -> GatewayResult<Vec<BaseUrl>> {
        Ok(self
            .base_urls
            .iter()
            .map(|b| BaseUrl {
                id: b.id.clone(),
                name: b.name.clone(),
            })
            .collect())
    }

    async fn base_url_info(&self, id: &str) -> GatewayResult<BaseUrlInfo> {
        self.base_urls
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound {
                resource: format!("base url {id}"),
            })
    }

    async fn list_replication_groups(&self) -> GatewayResult<Vec<ReplicationGroup>> {
        Ok(self.replication_groups.clone())
    }
}
