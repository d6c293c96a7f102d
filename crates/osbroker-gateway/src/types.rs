//! Data types exchanged with the remote management service.

use serde::{Deserialize, Serialize};

/// A free-form settings map attached to create/update calls.
pub type GatewaySettings = serde_json::Map<String, serde_json::Value>;

/// Request payload for bucket creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketCreate {
    /// Physical bucket name (already prefixed).
    pub name: String,
    /// Namespace the bucket lives in.
    pub namespace: String,
    /// Replication group id placing the bucket.
    pub replication_group: String,
    /// Effective settings applied at creation.
    #[serde(default)]
    pub settings: GatewaySettings,
}

/// Bucket metadata returned by the management service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    /// Physical bucket name.
    pub name: String,
    /// Namespace the bucket lives in.
    pub namespace: String,
    /// Whether filesystem (NFS) access is enabled on the bucket.
    pub file_system_enabled: bool,
}

/// Request payload for namespace creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceCreate {
    /// Physical namespace name (already prefixed).
    pub name: String,
    /// Replication group id placing the namespace.
    pub replication_group: String,
    /// Effective settings applied at creation.
    #[serde(default)]
    pub settings: GatewaySettings,
}

/// One user entry in a bucket access list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketUserAcl {
    /// The remote user name.
    pub user: String,
    /// Granted permissions (e.g. `full_control`, `read`, `write`).
    pub permissions: Vec<String>,
}

/// A bucket's user access list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketAcl {
    /// Per-user grants.
    pub user_access: Vec<BucketUserAcl>,
}

/// One statement of a bucket policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketPolicyStatement {
    /// Statement identifier.
    pub sid: String,
    /// Effect, `Allow` or `Deny`.
    pub effect: String,
    /// Principal user the statement applies to.
    pub principal: String,
    /// Granted protocol actions.
    pub actions: Vec<String>,
    /// Resources the statement covers.
    pub resources: Vec<String>,
}

/// An S3-style bucket policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketPolicy {
    /// Policy language version.
    pub version: String,
    /// Policy identifier.
    pub id: String,
    /// Policy statements.
    pub statements: Vec<BucketPolicyStatement>,
}

/// An NFS export entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfsExport {
    /// Absolute export path.
    pub path: String,
}

/// A generated user secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSecret {
    /// The secret key value.
    pub secret_key: String,
}

/// A base-URL catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseUrl {
    /// Entry identifier.
    pub id: String,
    /// Entry name (e.g. `DefaultBaseUrl`).
    pub name: String,
}

/// Detailed base-URL metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseUrlInfo {
    /// Entry identifier.
    pub id: String,
    /// Entry name.
    pub name: String,
    /// Host the endpoint is served from.
    pub host: String,
}

impl BaseUrlInfo {
    /// HTTP object port.
    pub const HTTP_PORT: u16 = 9020;
    /// HTTPS object port.
    pub const HTTPS_PORT: u16 = 9021;

    /// Build the per-namespace endpoint URL for this base URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use osbroker_gateway::types::BaseUrlInfo;
    ///
    /// let info = BaseUrlInfo {
    ///     id: "url-1".to_owned(),
    ///     name: "DefaultBaseUrl".to_owned(),
    ///     host: "ecs.local".to_owned(),
    /// };
    /// assert_eq!(info.namespace_url("ns1", false), "http://ns1.ecs.local:9020");
    /// assert_eq!(info.namespace_url("ns1", true), "https://ns1.ecs.local:9021");
    /// ```
    #[must_use]
    pub fn namespace_url(&self, namespace: &str, use_ssl: bool) -> String {
        if use_ssl {
            format!("https://{namespace}.{}:{}", self.host, Self::HTTPS_PORT)
        } else {
            format!("http://{namespace}.{}:{}", self.host, Self::HTTP_PORT)
        }
    }
}

/// A replication group entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationGroup {
    /// Group identifier.
    pub id: String,
    /// Group name.
    pub name: String,
}
