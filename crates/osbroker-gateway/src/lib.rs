//! Remote storage management contract for the object storage broker.
//!
//! The broker never talks the management wire protocol itself; it drives a
//! [`StorageGateway`], the call contract of the remote management service
//! (buckets, namespaces, users, ACLs, quotas, retention, NFS exports, uid
//! mappings, endpoint metadata). [`InMemoryGateway`] implements the full
//! contract over in-process state for tests and local development.

pub mod error;
pub mod gateway;
pub mod memory;
pub mod types;

pub use error::{GatewayError, GatewayResult};
pub use gateway::StorageGateway;
pub use memory::InMemoryGateway;
pub use types::{
    BaseUrl, BaseUrlInfo, BucketAcl, BucketCreate, BucketInfo, BucketPolicy,
    BucketPolicyStatement, BucketUserAcl, NamespaceCreate, NfsExport, ReplicationGroup,
    UserSecret,
};
