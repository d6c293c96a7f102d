//! Broker error taxonomy.
//!
//! Already-exists and not-found conditions are distinct variants and pass
//! through the entry-point services untouched; everything else surfaces as a
//! generic broker failure.

use osbroker_core::repository::RepositoryError;
use osbroker_gateway::GatewayError;

/// Message returned when local and remote settings disagree on a
/// remote-connection create.
pub const SETTINGS_MISMATCH: &str =
    "service definition must match between local and remote instances";

/// Broker workflow error type.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The physical resource backing an instance already exists.
    #[error("service instance already exists: {instance_id}")]
    InstanceExists {
        /// The conflicting instance id.
        instance_id: String,
        /// The service the instance was requested under.
        service_id: String,
    },

    /// The referenced instance record is missing from the repository.
    #[error("service instance does not exist: {instance_id}")]
    InstanceNotFound {
        /// The missing instance id.
        instance_id: String,
    },

    /// The remote-connection target instance is missing.
    #[error("Remotely connected service instance not found")]
    RemoteInstanceNotFound,

    /// A binding user already exists under the binding id.
    #[error("binding already exists: {binding_id} for instance {instance_id}")]
    BindingExists {
        /// The owning instance id.
        instance_id: String,
        /// The conflicting binding id.
        binding_id: String,
    },

    /// The referenced binding record is missing.
    #[error("binding does not exist: {binding_id}")]
    BindingNotFound {
        /// The missing binding id.
        binding_id: String,
    },

    /// A request failed validation.
    #[error("{0}")]
    Validation(String),

    /// The operation is not supported for this instance kind or state.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// No service definition matches the requested service id.
    #[error("no service matching service id: {0}")]
    ServiceNotFound(String),

    /// No plan matches the requested plan id.
    #[error("no plan matching plan id: {0}")]
    PlanNotFound(String),

    /// No base-URL entry matches the configured or requested name.
    #[error("base URL not found: {0}")]
    BaseUrlNotFound(String),

    /// Startup resolution of endpoints or replication groups failed.
    #[error("broker initialization failed: {0}")]
    Initialization(String),

    /// An endpoint URL could not be parsed.
    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    /// A remote management call failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A repository call failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_format_remote_not_found_message() {
        let err = BrokerError::RemoteInstanceNotFound;
        assert_eq!(err.to_string(), "Remotely connected service instance not found");
    }

    #[test]
    fn test_should_pass_validation_message_through() {
        let err = BrokerError::Validation(SETTINGS_MISMATCH.to_owned());
        assert_eq!(err.to_string(), SETTINGS_MISMATCH);
    }

    #[test]
    fn test_should_wrap_gateway_errors_transparently() {
        let err: BrokerError = GatewayError::UidAlreadyMapped { uid: 9 }.into();
        assert!(matches!(
            err,
            BrokerError::Gateway(GatewayError::UidAlreadyMapped { uid: 9 })
        ));
    }
}
