//! The remote storage management contract.

use async_trait::async_trait;

use crate::error::GatewayResult;
use crate::types::{
    BaseUrl, BaseUrlInfo, BucketAcl, BucketCreate, BucketInfo, BucketPolicy, GatewaySettings,
    NamespaceCreate, NfsExport, ReplicationGroup, UserSecret,
};

/// Call contract of the remote storage management service.
///
/// All operations are remote calls and may fail with
/// [`crate::GatewayError`]; the broker workflows treat any such failure as a
/// generic remote-operation failure unless a structured variant applies.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    // -- buckets ----------------------------------------------------------

    /// Whether a bucket exists in the namespace.
    async fn bucket_exists(&self, name: &str, namespace: &str) -> GatewayResult<bool>;

    /// Create a bucket.
    async fn create_bucket(&self, request: &BucketCreate) -> GatewayResult<()>;

    /// Delete a bucket.
    async fn delete_bucket(&self, name: &str, namespace: &str) -> GatewayResult<()>;

    /// Fetch bucket metadata.
    async fn get_bucket_info(&self, name: &str, namespace: &str) -> GatewayResult<BucketInfo>;

    /// Create or replace the bucket quota.
    async fn set_bucket_quota(
        &self,
        name: &str,
        namespace: &str,
        limit: i64,
        warn: i64,
    ) -> GatewayResult<()>;

    /// Delete the bucket quota.
    async fn delete_bucket_quota(&self, name: &str, namespace: &str) -> GatewayResult<()>;

    /// Set the bucket's default retention period, in seconds.
    async fn set_bucket_retention(
        &self,
        name: &str,
        namespace: &str,
        period: i64,
    ) -> GatewayResult<()>;

    /// Fetch the bucket's user access list.
    async fn get_bucket_acl(&self, name: &str, namespace: &str) -> GatewayResult<BucketAcl>;

    /// Replace the bucket's user access list.
    async fn update_bucket_acl(
        &self,
        name: &str,
        namespace: &str,
        acl: &BucketAcl,
    ) -> GatewayResult<()>;

    /// Attach or replace the bucket policy.
    async fn set_bucket_policy(
        &self,
        name: &str,
        namespace: &str,
        policy: &BucketPolicy,
    ) -> GatewayResult<()>;

    // -- namespaces -------------------------------------------------------

    /// Whether a namespace exists.
    async fn namespace_exists(&self, name: &str) -> GatewayResult<bool>;

    /// Create a namespace.
    async fn create_namespace(&self, request: &NamespaceCreate) -> GatewayResult<()>;

    /// Update a namespace's settings.
    async fn update_namespace(&self, name: &str, settings: &GatewaySettings) -> GatewayResult<()>;

    /// Delete a namespace.
    async fn delete_namespace(&self, name: &str) -> GatewayResult<()>;

    /// Create or replace the namespace quota.
    async fn set_namespace_quota(&self, name: &str, limit: i64, warn: i64) -> GatewayResult<()>;

    /// Whether a retention class exists on a namespace.
    async fn retention_class_exists(&self, namespace: &str, class: &str) -> GatewayResult<bool>;

    /// Create a retention class on a namespace.
    async fn create_retention_class(
        &self,
        namespace: &str,
        class: &str,
        period: i64,
    ) -> GatewayResult<()>;

    /// Update a retention class period.
    async fn update_retention_class(
        &self,
        namespace: &str,
        class: &str,
        period: i64,
    ) -> GatewayResult<()>;

    /// Delete a retention class from a namespace.
    async fn delete_retention_class(&self, namespace: &str, class: &str) -> GatewayResult<()>;

    // -- users ------------------------------------------------------------

    /// Whether a remote user exists in the namespace.
    async fn user_exists(&self, name: &str, namespace: &str) -> GatewayResult<bool>;

    /// Create a remote user scoped to a namespace.
    async fn create_user(&self, name: &str, namespace: &str) -> GatewayResult<()>;

    /// Delete a remote user.
    async fn delete_user(&self, name: &str) -> GatewayResult<()>;

    /// Generate and return a secret key for a user.
    async fn create_user_secret(&self, name: &str) -> GatewayResult<UserSecret>;

    // -- uid mappings / NFS ----------------------------------------------

    /// Map a UNIX uid to a remote user.
    ///
    /// Fails with [`crate::GatewayError::UidAlreadyMapped`] when the uid is
    /// taken by another user.
    async fn create_uid_mapping(&self, user: &str, uid: u32, namespace: &str)
    -> GatewayResult<()>;

    /// Remove a uid-to-user mapping.
    async fn delete_uid_mapping(&self, user: &str, uid: u32, namespace: &str)
    -> GatewayResult<()>;

    /// List NFS exports rooted at a path. Empty when none exist.
    async fn list_nfs_exports(&self, path: &str) -> GatewayResult<Vec<NfsExport>>;

    /// Create an NFS export at an absolute path.
    async fn create_nfs_export(&self, path: &str) -> GatewayResult<()>;

    // -- endpoint metadata ------------------------------------------------

    /// List base-URL catalog entries.
    async fn list_base_urls(&self) -> GatewayResult<Vec<BaseUrl>>;

    /// Fetch detailed metadata for a base-URL entry.
    async fn base_url_info(&self, id: &str) -> GatewayResult<BaseUrlInfo>;

    /// List replication groups.
    async fn list_replication_groups(&self) -> GatewayResult<Vec<ReplicationGroup>>;
}
