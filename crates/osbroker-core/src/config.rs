//! Broker configuration.
//!
//! Provides [`BrokerConfig`] for configuring the storage broker. Values are
//! loaded from environment variables via [`BrokerConfig::from_env`], with
//! defaults suitable for a single-site deployment.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Storage broker configuration.
///
/// All fields have defaults; configuration can be loaded from environment
/// variables via [`BrokerConfig::from_env`].
///
/// # Examples
///
/// ```
/// use osbroker_core::config::BrokerConfig;
///
/// let config = BrokerConfig::default();
/// assert_eq!(config.prefix, "broker-");
/// assert_eq!(config.namespace, "ns1");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfig {
    /// Prefix applied to every physical resource name the broker creates.
    #[builder(default = String::from("broker-"))]
    pub prefix: String,

    /// Management namespace under which broker-owned buckets and users live.
    #[builder(default = String::from("ns1"))]
    pub namespace: String,

    /// Name of the replication group new resources are placed in.
    #[builder(default = String::from("rg1"))]
    pub replication_group: String,

    /// Name of the base URL entry to resolve endpoints from. When unset the
    /// gateway's default entry is used.
    #[builder(default)]
    pub base_url: Option<String>,

    /// Explicit object endpoint override. When set, no base-URL lookup is
    /// performed at startup.
    #[builder(default)]
    pub object_endpoint: Option<String>,

    /// Host used for NFS volume mounts. Falls back to the object endpoint's
    /// host when unset.
    #[builder(default)]
    pub nfs_mount_host: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            prefix: String::from("broker-"),
            namespace: String::from("ns1"),
            replication_group: String::from("rg1"),
            base_url: None,
            object_endpoint: None,
            nfs_mount_host: None,
        }
    }
}

impl BrokerConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `BROKER_PREFIX` | `broker-` |
    /// | `BROKER_NAMESPACE` | `ns1` |
    /// | `BROKER_REPLICATION_GROUP` | `rg1` |
    /// | `BROKER_BASE_URL` | unset |
    /// | `BROKER_OBJECT_ENDPOINT` | unset |
    /// | `BROKER_NFS_MOUNT_HOST` | unset |
    ///
    /// # Examples
    ///
    /// ```
    /// use osbroker_core::config::BrokerConfig;
    ///
    /// let config = BrokerConfig::from_env();
    /// assert!(!config.prefix.is_empty());
    /// ```
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("BROKER_PREFIX") {
            config.prefix = v;
        }
        if let Ok(v) = std::env::var("BROKER_NAMESPACE") {
            config.namespace = v;
        }
        if let Ok(v) = std::env::var("BROKER_REPLICATION_GROUP") {
            config.replication_group = v;
        }
        if let Ok(v) = std::env::var("BROKER_BASE_URL") {
            config.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("BROKER_OBJECT_ENDPOINT") {
            config.object_endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("BROKER_NFS_MOUNT_HOST") {
            config.nfs_mount_host = Some(v);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = BrokerConfig::default();
        assert_eq!(config.prefix, "broker-");
        assert_eq!(config.namespace, "ns1");
        assert_eq!(config.replication_group, "rg1");
        assert!(config.base_url.is_none());
        assert!(config.object_endpoint.is_none());
        assert!(config.nfs_mount_host.is_none());
    }

    #[test]
    fn test_should_load_from_env() {
        let config = BrokerConfig::from_env();
        assert!(!config.prefix.is_empty());
    }

    #[test]
    fn test_should_build_with_typed_builder() {
        let config = BrokerConfig::builder()
            .prefix("pcf-".into())
            .namespace("tenant".into())
            .replication_group("rg-east".into())
            .base_url(Some("DefaultBaseUrl".into()))
            .object_endpoint(Some("http://127.0.0.1:9020".into()))
            .nfs_mount_host(Some("nfs.local".into()))
            .build();

        assert_eq!(config.prefix, "pcf-");
        assert_eq!(config.namespace, "tenant");
        assert_eq!(config.replication_group, "rg-east");
        assert_eq!(config.base_url.as_deref(), Some("DefaultBaseUrl"));
        assert_eq!(
            config.object_endpoint.as_deref(),
            Some("http://127.0.0.1:9020")
        );
        assert_eq!(config.nfs_mount_host.as_deref(), Some("nfs.local"));
    }

    #[test]
    fn test_should_serialize_to_camel_case_json() {
        let config = BrokerConfig::default();
        let json = serde_json::to_string(&config).expect("test serialization");
        assert!(json.contains("replicationGroup"));
        assert!(json.contains("nfsMountHost"));
    }
}
