//! Provisioning entry points.
//!
//! [`ProvisioningService`] is the orchestration between the broker's
//! protocol layer and the workflows: it resolves catalog metadata, selects
//! the workflow once per request, and persists the resulting records.

use std::sync::Arc;

use osbroker_core::catalog::Catalog;
use osbroker_core::instance::ServiceInstance;
use osbroker_core::repository::InstanceRepository;
use osbroker_core::settings::Settings;
use tracing::info;

use crate::error::{BrokerError, BrokerResult};
use crate::instance::{InstanceWorkflow, ProvisionRequest};
use crate::storage::StorageService;

/// Entry-point service for instance provisioning.
pub struct ProvisioningService {
    storage: Arc<StorageService>,
    repository: Arc<dyn InstanceRepository>,
    catalog: Catalog,
}

impl std::fmt::Debug for ProvisioningService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningService").finish_non_exhaustive()
    }
}

impl ProvisioningService {
    /// Build the service.
    #[must_use]
    pub fn new(
        storage: Arc<StorageService>,
        repository: Arc<dyn InstanceRepository>,
        catalog: Catalog,
    ) -> Self {
        Self {
            storage,
            repository,
            catalog,
        }
    }

    /// Provision a new service instance and persist its record.
    pub async fn create_instance(
        &self,
        instance_id: &str,
        service_id: &str,
        plan_id: &str,
        parameters: Settings,
    ) -> BrokerResult<ServiceInstance> {
        info!(instance_id, service_id, "creating service instance");

        let request = self.resolve_request(instance_id, service_id, plan_id, parameters)?;
        let workflow = InstanceWorkflow::for_create(
            Arc::clone(&self.storage),
            Arc::clone(&self.repository),
            &request.service,
            &request.parameters,
        );

        let instance = workflow.create(&request).await?;
        self.repository.save(&instance).await?;
        Ok(instance)
    }

    /// Deprovision a service instance and remove its record.
    pub async fn delete_instance(&self, instance_id: &str, service_id: &str) -> BrokerResult<()> {
        info!(instance_id, "deleting service instance");

        let service = self
            .catalog
            .find_service(service_id)
            .ok_or_else(|| BrokerError::ServiceNotFound(service_id.to_owned()))?;
        let workflow = InstanceWorkflow::for_kind(
            Arc::clone(&self.storage),
            Arc::clone(&self.repository),
            service,
        );

        workflow.delete(instance_id).await?;
        self.repository.delete(instance_id).await?;
        Ok(())
    }

    /// Change an instance's plan, replacing its stored settings.
    ///
    /// Plan changes of shared instances are refused; the settings equality
    /// guarantee between remote-connection tenants would not survive one.
    pub async fn update_instance(
        &self,
        instance_id: &str,
        service_id: &str,
        plan_id: &str,
        parameters: Settings,
    ) -> BrokerResult<ServiceInstance> {
        info!(instance_id, plan_id, "changing service instance plan");

        let mut instance = self
            .repository
            .find(instance_id)
            .await?
            .ok_or_else(|| BrokerError::InstanceNotFound {
                instance_id: instance_id.to_owned(),
            })?;
        if instance.is_shared() {
            return Err(BrokerError::Unsupported(
                "cannot change plan of a shared service instance".to_owned(),
            ));
        }

        let request = self.resolve_request(instance_id, service_id, plan_id, parameters)?;
        let workflow = InstanceWorkflow::for_kind(
            Arc::clone(&self.storage),
            Arc::clone(&self.repository),
            &request.service,
        );

        let applied = workflow.change_plan(&instance.name, &request).await?;
        instance.update_plan(plan_id, applied);
        self.repository.save(&instance).await?;
        Ok(instance)
    }

    fn resolve_request(
        &self,
        instance_id: &str,
        service_id: &str,
        plan_id: &str,
        parameters: Settings,
    ) -> BrokerResult<ProvisionRequest> {
        let service = self
            .catalog
            .find_service(service_id)
            .ok_or_else(|| BrokerError::ServiceNotFound(service_id.to_owned()))?;
        let plan = service
            .find_plan(plan_id)
            .ok_or_else(|| BrokerError::PlanNotFound(plan_id.to_owned()))?;
        Ok(ProvisionRequest {
            instance_id: instance_id.to_owned(),
            service: service.clone(),
            plan: plan.clone(),
            parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use osbroker_core::catalog::{Plan, ResourceKind, ServiceDefinition};
    use osbroker_core::config::BrokerConfig;
    use osbroker_core::repository::InMemoryInstanceRepository;
    use osbroker_core::settings;
    use osbroker_gateway::{InMemoryGateway, StorageGateway};
    use serde_json::json;

    use crate::error::SETTINGS_MISMATCH;

    use super::*;

    const INSTANCE_ID: &str = "service-instance-id";
    const REMOTE_INSTANCE_ID: &str = "remote-instance-id";

    fn settings_map(value: serde_json::Value) -> Settings {
        value.as_object().cloned().unwrap_or_default()
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            ServiceDefinition {
                id: "bucket-service".to_owned(),
                name: "object-bucket".to_owned(),
                service_type: ResourceKind::Bucket,
                service_settings: settings_map(json!({"encrypted": true})),
                plans: vec![
                    Plan {
                        id: "5gb".to_owned(),
                        name: "5gb".to_owned(),
                        service_settings: settings_map(json!({"quota": {"limit": 5, "warn": 4}})),
                    },
                    Plan {
                        id: "unlimited".to_owned(),
                        name: "unlimited".to_owned(),
                        service_settings: settings_map(json!({"quota": {"limit": -1, "warn": -1}})),
                    },
                ],
            },
            ServiceDefinition {
                id: "namespace-service".to_owned(),
                name: "tenant-namespace".to_owned(),
                service_type: ResourceKind::Namespace,
                service_settings: Settings::new(),
                plans: vec![
                    Plan {
                        id: "default".to_owned(),
                        name: "default".to_owned(),
                        service_settings: settings_map(json!({"retention": {"gold": 3600}})),
                    },
                    Plan {
                        id: "no-retention".to_owned(),
                        name: "no-retention".to_owned(),
                        service_settings: settings_map(json!({"retention": {"gold": -1}})),
                    },
                ],
            },
        ])
    }

    async fn service_under_test() -> (
        ProvisioningService,
        Arc<InMemoryGateway>,
        Arc<InMemoryInstanceRepository>,
    ) {
        let gateway = Arc::new(InMemoryGateway::new());
        let repository = Arc::new(InMemoryInstanceRepository::new());
        let storage = StorageService::initialize(
            Arc::clone(&gateway) as Arc<dyn StorageGateway>,
            BrokerConfig::default(),
        )
        .await
        .expect("initialize storage");
        let service = ProvisioningService::new(
            Arc::new(storage),
            Arc::clone(&repository) as Arc<dyn InstanceRepository>,
            catalog(),
        );
        (service, gateway, repository)
    }

    #[tokio::test]
    async fn test_should_create_bucket_instance_with_applied_settings() {
        let (service, gateway, repository) = service_under_test().await;

        let instance = service
            .create_instance(INSTANCE_ID, "bucket-service", "5gb", Settings::new())
            .await
            .expect("create");

        assert_eq!(instance.name, INSTANCE_ID);
        assert_eq!(instance.reference_count(), 1);
        let applied = instance.service_settings.expect("settings");
        assert_eq!(applied.get("encrypted"), Some(&json!(true)));

        assert!(
            gateway
                .bucket_exists(&format!("broker-{INSTANCE_ID}"), "ns1")
                .await
                .expect("exists")
        );
        assert_eq!(
            gateway.bucket_quota(&format!("broker-{INSTANCE_ID}")),
            Some((5, 4))
        );
        assert_eq!(repository.len(), 1);
    }

    #[tokio::test]
    async fn test_should_alias_bucket_name_from_parameter() {
        let (service, gateway, _) = service_under_test().await;

        let instance = service
            .create_instance(
                INSTANCE_ID,
                "bucket-service",
                "5gb",
                settings_map(json!({"name": "shared-data"})),
            )
            .await
            .expect("create");

        assert_eq!(instance.name, format!("shared-data-{INSTANCE_ID}"));
        assert!(
            gateway
                .bucket_exists(&format!("broker-shared-data-{INSTANCE_ID}"), "ns1")
                .await
                .expect("exists")
        );
    }

    #[tokio::test]
    async fn test_should_refuse_create_when_bucket_exists() {
        let (service, _, _) = service_under_test().await;

        service
            .create_instance(INSTANCE_ID, "bucket-service", "5gb", Settings::new())
            .await
            .expect("create");
        let result = service
            .create_instance(INSTANCE_ID, "bucket-service", "5gb", Settings::new())
            .await;
        assert!(matches!(result, Err(BrokerError::InstanceExists { .. })));
    }

    #[tokio::test]
    async fn test_should_fail_create_for_unknown_service_or_plan() {
        let (service, _, _) = service_under_test().await;

        let result = service
            .create_instance(INSTANCE_ID, "nope", "5gb", Settings::new())
            .await;
        assert!(matches!(result, Err(BrokerError::ServiceNotFound(_))));

        let result = service
            .create_instance(INSTANCE_ID, "bucket-service", "nope", Settings::new())
            .await;
        assert!(matches!(result, Err(BrokerError::PlanNotFound(_))));
    }

    #[tokio::test]
    async fn test_should_delete_sole_reference_and_bucket() {
        let (service, gateway, repository) = service_under_test().await;

        service
            .create_instance(INSTANCE_ID, "bucket-service", "5gb", Settings::new())
            .await
            .expect("create");
        service
            .delete_instance(INSTANCE_ID, "bucket-service")
            .await
            .expect("delete");

        assert!(
            !gateway
                .bucket_exists(&format!("broker-{INSTANCE_ID}"), "ns1")
                .await
                .expect("exists")
        );
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_should_fail_delete_of_unknown_instance() {
        let (service, _, _) = service_under_test().await;
        let result = service.delete_instance("ghost", "bucket-service").await;
        assert!(matches!(result, Err(BrokerError::InstanceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_should_release_shared_reference_without_deleting_bucket() {
        let (service, gateway, repository) = service_under_test().await;

        let remote = service
            .create_instance(REMOTE_INSTANCE_ID, "bucket-service", "5gb", Settings::new())
            .await
            .expect("create remote");

        let params = settings_map(json!({
            "remote_connection": {
                "accessKey": "binding-id",
                "secretKey": "secret",
                "instanceId": REMOTE_INSTANCE_ID,
            }
        }));
        service
            .create_instance(INSTANCE_ID, "bucket-service", "5gb", params)
            .await
            .expect("create local");

        service
            .delete_instance(INSTANCE_ID, "bucket-service")
            .await
            .expect("delete local");

        // The physical bucket survives; the sibling lost exactly this id.
        assert!(
            gateway
                .bucket_exists(&format!("broker-{}", remote.name), "ns1")
                .await
                .expect("exists")
        );
        let sibling = repository
            .find(REMOTE_INSTANCE_ID)
            .await
            .expect("find")
            .expect("sibling present");
        assert_eq!(sibling.reference_count(), 1);
        assert!(sibling.references.contains(REMOTE_INSTANCE_ID));
    }

    /// Repository wrapper counting saves, for asserting sibling updates.
    struct CountingRepository {
        inner: InMemoryInstanceRepository,
        saves: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl InstanceRepository for CountingRepository {
        async fn find(
            &self,
            instance_id: &str,
        ) -> osbroker_core::repository::RepositoryResult<Option<ServiceInstance>> {
            self.inner.find(instance_id).await
        }

        async fn save(
            &self,
            instance: &ServiceInstance,
        ) -> osbroker_core::repository::RepositoryResult<()> {
            self.saves
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.save(instance).await
        }

        async fn delete(
            &self,
            instance_id: &str,
        ) -> osbroker_core::repository::RepositoryResult<()> {
            self.inner.delete(instance_id).await
        }
    }

    #[tokio::test]
    async fn test_should_save_each_sibling_exactly_once_on_shared_delete() {
        let gateway = Arc::new(InMemoryGateway::new());
        let repository = Arc::new(CountingRepository {
            inner: InMemoryInstanceRepository::new(),
            saves: std::sync::atomic::AtomicUsize::new(0),
        });
        let storage = StorageService::initialize(
            Arc::clone(&gateway) as Arc<dyn StorageGateway>,
            BrokerConfig::default(),
        )
        .await
        .expect("initialize storage");
        let service = ProvisioningService::new(
            Arc::new(storage),
            Arc::clone(&repository) as Arc<dyn InstanceRepository>,
            catalog(),
        );

        // Three logical instances sharing one physical resource.
        for id in ["inst-a", "inst-b", "inst-c"] {
            let mut instance = ServiceInstance::new(id, "bucket-service", "5gb", "");
            instance.name = "inst-a".to_owned();
            instance.references =
                ["inst-a", "inst-b", "inst-c"].iter().map(|s| (*s).to_owned()).collect();
            repository.save(&instance).await.expect("seed");
        }
        repository
            .saves
            .store(0, std::sync::atomic::Ordering::SeqCst);

        service
            .delete_instance("inst-a", "bucket-service")
            .await
            .expect("delete");

        // Each of the two siblings was mutated and saved exactly once; the
        // physical resource was never touched (no bucket exists to delete).
        assert_eq!(repository.saves.load(std::sync::atomic::Ordering::SeqCst), 2);
        for id in ["inst-b", "inst-c"] {
            let sibling = repository
                .find(id)
                .await
                .expect("find")
                .expect("sibling present");
            assert_eq!(sibling.reference_count(), 2);
            assert!(!sibling.references.contains("inst-a"));
        }
        assert!(repository.find("inst-a").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn test_should_recreate_quota_on_plan_change() {
        let (service, gateway, _) = service_under_test().await;

        service
            .create_instance(INSTANCE_ID, "bucket-service", "unlimited", Settings::new())
            .await
            .expect("create");

        let updated = service
            .update_instance(INSTANCE_ID, "bucket-service", "5gb", Settings::new())
            .await
            .expect("update");

        assert_eq!(updated.plan_id, "5gb");
        assert_eq!(
            gateway.bucket_quota(&format!("broker-{INSTANCE_ID}")),
            Some((5, 4))
        );
    }

    #[tokio::test]
    async fn test_should_delete_quota_when_both_limits_unset() {
        let (service, gateway, _) = service_under_test().await;

        service
            .create_instance(INSTANCE_ID, "bucket-service", "5gb", Settings::new())
            .await
            .expect("create");

        let updated = service
            .update_instance(INSTANCE_ID, "bucket-service", "unlimited", Settings::new())
            .await
            .expect("update");

        assert!(gateway.bucket_quota(&format!("broker-{INSTANCE_ID}")).is_none());
        let applied = updated.service_settings.expect("settings");
        assert!(!applied.contains_key(settings::QUOTA));
    }

    #[tokio::test]
    async fn test_should_refuse_plan_change_of_shared_instance() {
        let (service, _, _) = service_under_test().await;

        service
            .create_instance(REMOTE_INSTANCE_ID, "bucket-service", "5gb", Settings::new())
            .await
            .expect("create remote");
        let params = settings_map(json!({
            "remote_connection": {
                "accessKey": "binding-id",
                "secretKey": "secret",
                "instanceId": REMOTE_INSTANCE_ID,
            }
        }));
        service
            .create_instance(INSTANCE_ID, "bucket-service", "5gb", params)
            .await
            .expect("create local");

        let result = service
            .update_instance(REMOTE_INSTANCE_ID, "bucket-service", "unlimited", Settings::new())
            .await;
        assert!(matches!(result, Err(BrokerError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_should_fail_remote_connection_to_missing_instance() {
        let (service, _, repository) = service_under_test().await;

        let params = settings_map(json!({
            "remote_connection": {
                "accessKey": "binding-id",
                "secretKey": "secret",
                "instanceId": "absent",
            }
        }));
        let result = service
            .create_instance(INSTANCE_ID, "bucket-service", "5gb", params)
            .await;

        assert!(matches!(result, Err(BrokerError::RemoteInstanceNotFound)));
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_should_fail_remote_connection_on_settings_mismatch() {
        let (service, _, repository) = service_under_test().await;

        service
            .create_instance(REMOTE_INSTANCE_ID, "bucket-service", "5gb", Settings::new())
            .await
            .expect("create remote");
        let before = repository
            .find(REMOTE_INSTANCE_ID)
            .await
            .expect("find")
            .expect("present");

        // A different plan resolves to different effective settings.
        let params = settings_map(json!({
            "remote_connection": {
                "accessKey": "binding-id",
                "secretKey": "secret",
                "instanceId": REMOTE_INSTANCE_ID,
            }
        }));
        let result = service
            .create_instance(INSTANCE_ID, "bucket-service", "unlimited", params)
            .await;

        match result {
            Err(BrokerError::Validation(message)) => assert_eq!(message, SETTINGS_MISMATCH),
            other => panic!("expected validation error, got {other:?}"),
        }

        // Nothing was mutated.
        let after = repository
            .find(REMOTE_INSTANCE_ID)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(after.reference_count(), before.reference_count());
        assert!(repository.find(INSTANCE_ID).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn test_should_share_references_on_matching_remote_connection() {
        let (service, _, repository) = service_under_test().await;

        service
            .create_instance(REMOTE_INSTANCE_ID, "bucket-service", "5gb", Settings::new())
            .await
            .expect("create remote");

        let params = settings_map(json!({
            "remote_connection": {
                "accessKey": "binding-id",
                "secretKey": "secret",
                "instanceId": REMOTE_INSTANCE_ID,
            }
        }));
        let local = service
            .create_instance(INSTANCE_ID, "bucket-service", "5gb", params)
            .await
            .expect("create local");

        // Local record: shared physical name, both references, no settings.
        assert_eq!(local.name, REMOTE_INSTANCE_ID);
        assert_eq!(local.reference_count(), 2);
        assert!(local.references.contains(REMOTE_INSTANCE_ID));
        assert!(local.references.contains(INSTANCE_ID));
        assert!(local.service_settings.is_none());

        // Remote record: exactly both ids.
        let remote = repository
            .find(REMOTE_INSTANCE_ID)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(remote.reference_count(), 2);
        assert!(remote.references.contains(INSTANCE_ID));
    }

    #[tokio::test]
    async fn test_should_reject_invalid_remote_connection_key() {
        let (service, _, repository) = service_under_test().await;

        service
            .create_instance(REMOTE_INSTANCE_ID, "bucket-service", "5gb", Settings::new())
            .await
            .expect("create remote");

        // Mint a key on the remote instance, then present the wrong secret.
        let mut remote = repository
            .find(REMOTE_INSTANCE_ID)
            .await
            .expect("find")
            .expect("present");
        remote.add_remote_connection_key("binding-id", "the-right-token");
        repository.save(&remote).await.expect("save");

        let params = settings_map(json!({
            "remote_connection": {
                "accessKey": "binding-id",
                "secretKey": "the-wrong-token",
                "instanceId": REMOTE_INSTANCE_ID,
            }
        }));
        let result = service
            .create_instance(INSTANCE_ID, "bucket-service", "5gb", params)
            .await;
        assert!(matches!(result, Err(BrokerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_should_create_namespace_instance_with_retention() {
        let (service, gateway, _) = service_under_test().await;

        let instance = service
            .create_instance(INSTANCE_ID, "namespace-service", "default", Settings::new())
            .await
            .expect("create");

        assert_eq!(instance.name, INSTANCE_ID);
        let classes = gateway.namespace_retention_classes(&format!("broker-{INSTANCE_ID}"));
        assert_eq!(classes.get("gold"), Some(&3600));
    }

    #[tokio::test]
    async fn test_should_delete_retention_class_on_unset_plan_change() {
        let (service, gateway, _) = service_under_test().await;

        service
            .create_instance(INSTANCE_ID, "namespace-service", "default", Settings::new())
            .await
            .expect("create");

        // An unset period for an existing class deletes it; the retention
        // key disappears from the applied settings.
        let updated = service
            .update_instance(INSTANCE_ID, "namespace-service", "no-retention", Settings::new())
            .await
            .expect("update");

        assert_eq!(updated.plan_id, "no-retention");
        assert!(
            gateway
                .namespace_retention_classes(&format!("broker-{INSTANCE_ID}"))
                .is_empty()
        );
        let applied = updated.service_settings.expect("settings");
        assert!(!applied.contains_key(settings::RETENTION));
    }
}
