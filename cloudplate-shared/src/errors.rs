//! Infrastructure error type shared across the workspace.
//!
//! Run-level failures (a fetch that failed, an import that never showed up)
//! live in `cloudplate::provision::ProvisionError`; this type covers the
//! plumbing underneath: filesystem, configuration, locking.

use thiserror::Error;

/// Result alias used by every fallible helper in the workspace.
pub type CloudplateResult<T> = Result<T, CloudplateError>;

#[derive(Debug, Error)]
pub enum CloudplateError {
    /// Invalid or unreadable configuration.
    #[error("config: {0}")]
    Config(String),

    /// Local filesystem operation failed.
    #[error("storage: {0}")]
    Storage(String),

    /// Caller passed a value that cannot be used.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// State machine was asked for a transition it does not allow.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// External command could not be executed or reported failure.
    #[error("execution: {0}")]
    Execution(String),

    /// Another run holds the work directory lock.
    #[error("locked: {0}")]
    Locked(String),

    /// Bug or broken invariant.
    #[error("internal: {0}")]
    Internal(String),
}

impl From<std::io::Error> for CloudplateError {
    fn from(err: std::io::Error) -> Self {
        CloudplateError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CloudplateError::Config("missing home".into());
        assert_eq!(err.to_string(), "config: missing home");

        let err = CloudplateError::Locked("/var/lib/cloudplate".into());
        assert!(err.to_string().starts_with("locked:"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CloudplateError = io.into();
        assert!(matches!(err, CloudplateError::Storage(_)));
        assert!(err.to_string().contains("denied"));
    }
}
