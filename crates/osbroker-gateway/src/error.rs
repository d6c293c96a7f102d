//! Gateway error types.
//!
//! Every variant a caller needs to branch on is structured; in particular
//! uid-mapping conflicts carry the conflicting uid instead of an opaque
//! message, so retry loops can match on the variant.

/// Error type for remote management calls.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The referenced remote resource does not exist.
    #[error("remote resource not found: {resource}")]
    NotFound {
        /// Identifier of the missing resource.
        resource: String,
    },

    /// The remote resource already exists.
    #[error("remote resource already exists: {resource}")]
    AlreadyExists {
        /// Identifier of the conflicting resource.
        resource: String,
    },

    /// The uid is already mapped to another user.
    #[error("uid {uid} is already mapped to another user")]
    UidAlreadyMapped {
        /// The conflicting uid.
        uid: u32,
    },

    /// The management service rejected or failed the call.
    #[error("remote management call failed: {message}")]
    Remote {
        /// Failure description from the management service.
        message: String,
    },

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_format_uid_conflict_with_uid() {
        let err = GatewayError::UidAlreadyMapped { uid: 5001 };
        assert!(err.to_string().contains("5001"));
    }

    #[test]
    fn test_should_match_on_uid_conflict_variant() {
        let err = GatewayError::UidAlreadyMapped { uid: 7 };
        assert!(matches!(err, GatewayError::UidAlreadyMapped { uid: 7 }));
    }
}
