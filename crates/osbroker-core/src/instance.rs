//! Durable service instance records.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// A logical provisioning record, possibly sharing a physical resource with
/// other instances.
///
/// `name` is the *unprefixed* physical resource name: `"<alias>-<id>"` when
/// the provisioning request carried a `name` parameter, otherwise the
/// instance id itself. Several logical instances may carry the same `name`,
/// in which case their `references` sets tie them to one physical resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstance {
    /// Caller-supplied logical instance identifier.
    pub instance_id: String,
    /// The service definition this instance was provisioned under.
    pub service_id: String,
    /// The plan this instance was provisioned under.
    pub plan_id: String,
    /// Unprefixed physical resource name.
    pub name: String,
    /// The effective settings the physical resource was created with.
    /// `None` for remote-connection instances, which inherit the remote
    /// instance's settings through the shared physical resource.
    pub service_settings: Option<Settings>,
    /// Logical instance ids sharing the physical resource, self included.
    pub references: BTreeSet<String>,
    /// Shared-secret tokens authorizing remote tenants to attach, keyed by
    /// binding id.
    #[serde(default)]
    pub remote_connection_keys: BTreeMap<String, String>,
}

impl ServiceInstance {
    /// Create a record for a freshly provisioned instance. The reference set
    /// starts with the instance itself.
    #[must_use]
    pub fn new(instance_id: &str, service_id: &str, plan_id: &str, alias: &str) -> Self {
        let name = resource_name(instance_id, alias);
        let references = BTreeSet::from([instance_id.to_owned()]);
        Self {
            instance_id: instance_id.to_owned(),
            service_id: service_id.to_owned(),
            plan_id: plan_id.to_owned(),
            name,
            service_settings: None,
            references,
            remote_connection_keys: BTreeMap::new(),
        }
    }

    /// Number of logical instances referencing the physical resource.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Whether the physical resource is shared with other logical instances.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.references.len() > 1
    }

    /// Add a logical instance id to the reference set.
    pub fn add_reference(&mut self, instance_id: &str) {
        self.references.insert(instance_id.to_owned());
    }

    /// Remove a logical instance id from the reference set.
    pub fn remove_reference(&mut self, instance_id: &str) {
        self.references.remove(instance_id);
    }

    /// Replace plan and settings after a successful plan change.
    pub fn update_plan(&mut self, plan_id: impl Into<String>, settings: Settings) {
        self.plan_id = plan_id.into();
        self.service_settings = Some(settings);
    }

    /// Mint a remote-connection key for a binding.
    pub fn add_remote_connection_key(
        &mut self,
        binding_id: impl Into<String>,
        key: impl Into<String>,
    ) {
        self.remote_connection_keys
            .insert(binding_id.into(), key.into());
    }

    /// Check presented remote-connection credentials against minted keys.
    #[must_use]
    pub fn remote_connection_key_valid(&self, access_key: &str, secret_key: &str) -> bool {
        self.remote_connection_keys
            .get(access_key)
            .is_some_and(|k| k == secret_key)
    }
}

/// Assemble the unprefixed physical resource name for an instance:
/// `"<alias>-<id>"` with an alias, the id alone without.
#[must_use]
pub fn resource_name(instance_id: &str, alias: &str) -> String {
    if alias.is_empty() {
        instance_id.to_owned()
    } else {
        format!("{alias}-{instance_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_default_name_to_instance_id() {
        let instance = ServiceInstance::new("inst-1", "svc", "plan", "");
        assert_eq!(instance.name, "inst-1");
        assert_eq!(instance.reference_count(), 1);
        assert!(instance.references.contains("inst-1"));
        assert!(instance.service_settings.is_none());
    }

    #[test]
    fn test_should_alias_name_when_parameter_supplied() {
        let instance = ServiceInstance::new("inst-1", "svc", "plan", "shared-data");
        assert_eq!(instance.name, "shared-data-inst-1");
    }

    #[test]
    fn test_should_track_references() {
        let mut instance = ServiceInstance::new("inst-1", "svc", "plan", "");
        assert!(!instance.is_shared());

        instance.add_reference("inst-2");
        assert!(instance.is_shared());
        assert_eq!(instance.reference_count(), 2);

        instance.remove_reference("inst-2");
        assert!(!instance.is_shared());
        assert!(instance.references.contains("inst-1"));
    }

    #[test]
    fn test_should_update_plan_and_settings() {
        let mut instance = ServiceInstance::new("inst-1", "svc", "plan-a", "");
        let settings = serde_json::json!({"quota": {"limit": 10, "warn": 8}})
            .as_object()
            .cloned()
            .unwrap_or_default();

        instance.update_plan("plan-b", settings.clone());
        assert_eq!(instance.plan_id, "plan-b");
        assert_eq!(instance.service_settings, Some(settings));
    }

    #[test]
    fn test_should_validate_remote_connection_keys() {
        let mut instance = ServiceInstance::new("inst-1", "svc", "plan", "");
        instance.add_remote_connection_key("binding-1", "token");

        assert!(instance.remote_connection_key_valid("binding-1", "token"));
        assert!(!instance.remote_connection_key_valid("binding-1", "wrong"));
        assert!(!instance.remote_connection_key_valid("binding-2", "token"));
    }

    #[test]
    fn test_should_roundtrip_through_json() {
        let mut instance = ServiceInstance::new("inst-1", "svc", "plan", "alias");
        instance.add_reference("inst-2");

        let json = serde_json::to_string(&instance).expect("test serialize");
        let back: ServiceInstance = serde_json::from_str(&json).expect("test deserialize");
        assert_eq!(back.instance_id, "inst-1");
        assert_eq!(back.name, "alias-inst-1");
        assert_eq!(back.reference_count(), 2);
    }
}
