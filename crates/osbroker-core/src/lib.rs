//! Core building blocks for the object storage service broker.
//!
//! This crate holds everything the broker workflows share: the broker
//! configuration, the settings-map model with its merge precedence, the
//! service catalog metadata, the durable instance/binding records, and the
//! repository contracts (plus an in-memory repository used by tests and
//! local development).
//!
//! # Architecture
//!
//! ```text
//! osbroker-workflow (provision / bind orchestration)
//!        |
//!        v
//! osbroker-core (records, catalog, settings, repositories)
//!        |
//!        v
//! osbroker-gateway (remote management contract)
//! ```

pub mod binding;
pub mod catalog;
pub mod config;
pub mod instance;
pub mod repository;
pub mod settings;

pub use binding::{DeviceType, MountMode, ServiceInstanceBinding, SharedVolumeDevice, VolumeMount};
pub use catalog::{Catalog, Plan, ResourceKind, ServiceDefinition};
pub use config::BrokerConfig;
pub use instance::ServiceInstance;
pub use repository::{
    BindingRepository, InMemoryBindingRepository, InMemoryInstanceRepository, InstanceRepository,
    RepositoryError, RepositoryResult,
};
pub use settings::Settings;
