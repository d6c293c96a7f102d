//! The S3-style listing/deletion contract the wipe engine consumes.
//!
//! Listings are requested URL-encoded; the engine decodes keys before
//! issuing deletes.

use async_trait::async_trait;

/// Error type for object-client calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The remote call was rejected or failed.
    #[error("object storage call failed: {message}")]
    Remote {
        /// Failure description.
        message: String,
    },

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for object-client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// One page of an object listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectListing {
    /// URL-encoded object keys on this page.
    pub keys: Vec<String>,
    /// Whether more keys are available.
    pub is_truncated: bool,
    /// Marker for the next page, when truncated.
    pub next_marker: Option<String>,
}

/// One entry of a version listing: an object version or a delete marker.
#[derive(Debug, Clone)]
pub struct VersionEntry {
    /// URL-encoded object key.
    pub key: String,
    /// Version identifier.
    pub version_id: String,
}

/// One page of a version listing.
#[derive(Debug, Clone, Default)]
pub struct VersionListing {
    /// Versions and delete markers on this page.
    pub versions: Vec<VersionEntry>,
    /// Whether more entries are available.
    pub is_truncated: bool,
    /// Key marker for the next page, when truncated.
    pub next_key_marker: Option<String>,
    /// Version-id marker for the next page, when truncated.
    pub next_version_id_marker: Option<String>,
}

/// S3-style client surface used to empty a bucket.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Whether the bucket has versioning enabled.
    async fn versioning_enabled(&self, bucket: &str) -> ClientResult<bool>;

    /// List one page of objects, continuing from `marker` when given.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
    ) -> ClientResult<ObjectListing>;

    /// List one page of versions, continuing from the marker pair when
    /// given.
    async fn list_versions(
        &self,
        bucket: &str,
        prefix: &str,
        key_marker: Option<&str>,
        version_id_marker: Option<&str>,
    ) -> ClientResult<VersionListing>;

    /// Delete a single object.
    async fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()>;

    /// Delete a single object version.
    async fn delete_version(&self, bucket: &str, key: &str, version_id: &str)
    -> ClientResult<()>;
}
