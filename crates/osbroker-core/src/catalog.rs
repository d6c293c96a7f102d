//! Service catalog metadata.
//!
//! The catalog describes the services and plans the broker offers. Catalog
//! entries are read-only at request time; their settings maps participate in
//! the merge precedence defined in [`crate::settings`].

use serde::{Deserialize, Serialize};

use crate::settings::{self, Settings};

/// The kind of physical resource a service definition provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// An object bucket.
    Bucket,
    /// A tenant namespace.
    Namespace,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bucket => f.write_str("bucket"),
            Self::Namespace => f.write_str("namespace"),
        }
    }
}

/// A plan within a service definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Unique plan identifier.
    pub id: String,
    /// Human-readable plan name.
    pub name: String,
    /// Settings contributed by this plan during merge.
    #[serde(default)]
    pub service_settings: Settings,
}

/// A service definition offered by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    /// Unique service identifier.
    pub id: String,
    /// Human-readable service name.
    pub name: String,
    /// The kind of resource this service provisions.
    pub service_type: ResourceKind,
    /// Settings contributed by this service during merge; these win over
    /// plan settings and request parameters.
    #[serde(default)]
    pub service_settings: Settings,
    /// Plans available under this service.
    #[serde(default)]
    pub plans: Vec<Plan>,
}

impl ServiceDefinition {
    /// Find a plan by id.
    #[must_use]
    pub fn find_plan(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == plan_id)
    }

    /// Resolve the effective settings for a request against this service and
    /// the given plan.
    #[must_use]
    pub fn resolve_settings(&self, plan: &Plan, parameters: &Settings) -> Settings {
        settings::resolve(parameters, &plan.service_settings, &self.service_settings)
    }
}

/// The broker's service catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// All service definitions offered by this broker.
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
}

impl Catalog {
    /// Create a catalog from a list of service definitions.
    #[must_use]
    pub fn new(services: Vec<ServiceDefinition>) -> Self {
        Self { services }
    }

    /// Find a service definition by id.
    #[must_use]
    pub fn find_service(&self, service_id: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.id == service_id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_catalog() -> Catalog {
        Catalog::new(vec![ServiceDefinition {
            id: "bucket-service".to_owned(),
            name: "object-bucket".to_owned(),
            service_type: ResourceKind::Bucket,
            service_settings: json!({"encrypted": true})
                .as_object()
                .cloned()
                .unwrap_or_default(),
            plans: vec![Plan {
                id: "5gb".to_owned(),
                name: "5gb".to_owned(),
                service_settings: json!({"quota": {"limit": 5, "warn": 4}})
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
            }],
        }])
    }

    #[test]
    fn test_should_find_service_and_plan() {
        let catalog = sample_catalog();
        let service = catalog.find_service("bucket-service");
        assert!(service.is_some());
        let plan = service.and_then(|s| s.find_plan("5gb"));
        assert!(plan.is_some());
    }

    #[test]
    fn test_should_return_none_for_unknown_ids() {
        let catalog = sample_catalog();
        assert!(catalog.find_service("nope").is_none());
        let service = catalog.find_service("bucket-service");
        assert!(service.and_then(|s| s.find_plan("nope")).is_none());
    }

    #[test]
    fn test_should_resolve_settings_through_catalog_entry() {
        let catalog = sample_catalog();
        let service = catalog
            .find_service("bucket-service")
            .unwrap_or_else(|| panic!("service missing"));
        let plan = service
            .find_plan("5gb")
            .unwrap_or_else(|| panic!("plan missing"));

        let params = json!({"encrypted": false}).as_object().cloned().unwrap();
        let merged = service.resolve_settings(plan, &params);

        // Service settings win over request parameters.
        assert_eq!(merged.get("encrypted"), Some(&json!(true)));
        assert_eq!(merged.get("quota"), Some(&json!({"limit": 5, "warn": 4})));
    }

    #[test]
    fn test_should_display_resource_kind() {
        assert_eq!(ResourceKind::Bucket.to_string(), "bucket");
        assert_eq!(ResourceKind::Namespace.to_string(), "namespace");
    }

    #[test]
    fn test_should_deserialize_resource_kind_lowercase() {
        let kind: ResourceKind = serde_json::from_str("\"namespace\"").expect("test deserialize");
        assert_eq!(kind, ResourceKind::Namespace);
    }
}
