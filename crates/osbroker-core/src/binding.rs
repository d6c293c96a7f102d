//! Durable binding records and volume-mount descriptors.

use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// How a volume is mounted into the consumer's container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountMode {
    /// Read-only mount.
    R,
    /// Read-write mount.
    Rw,
}

/// The sharing model of a mounted device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// A device shared between containers.
    Shared,
}

/// Driver-specific device description for a shared volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedVolumeDevice {
    /// Export-scoped device identifier.
    pub volume_id: String,
    /// Driver options; for NFS exports this carries `source` (the NFS URL)
    /// and `uid` (the allocated UNIX id as a string).
    pub mount_config: std::collections::BTreeMap<String, String>,
}

/// A filesystem mount handed back with bucket bindings on
/// filesystem-enabled buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    /// Volume driver name.
    pub driver: String,
    /// Mount path inside the consumer's container.
    pub container_dir: String,
    /// Mount mode.
    pub mode: MountMode,
    /// Device sharing model.
    pub device_type: DeviceType,
    /// Device description.
    pub device: SharedVolumeDevice,
}

/// A consumer's credentialed attachment to a service instance.
///
/// The binding request's own parameters are retained because unbind runs
/// long after the original request and is not replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstanceBinding {
    /// Unique binding identifier.
    pub binding_id: String,
    /// The owning instance.
    pub instance_id: String,
    /// Protocol-specific access data returned to the consumer.
    pub credentials: Settings,
    /// Filesystem mounts, when the binding carries an NFS export.
    #[serde(default)]
    pub volume_mounts: Vec<VolumeMount>,
    /// The binding request's parameters, kept for unbind.
    #[serde(default)]
    pub parameters: Settings,
}

impl ServiceInstanceBinding {
    /// Create a binding record.
    #[must_use]
    pub fn new(
        binding_id: impl Into<String>,
        instance_id: impl Into<String>,
        credentials: Settings,
        volume_mounts: Vec<VolumeMount>,
        parameters: Settings,
    ) -> Self {
        Self {
            binding_id: binding_id.into(),
            instance_id: instance_id.into(),
            credentials,
            volume_mounts,
            parameters,
        }
    }

    /// The `uid` mount-config entry of the first volume mount, if any.
    #[must_use]
    pub fn mount_uid(&self) -> Option<&str> {
        self.volume_mounts
            .first()
            .and_then(|m| m.device.mount_config.get("uid"))
            .map(String::as_str)
    }
}
