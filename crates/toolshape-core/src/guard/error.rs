//! Error types for the input guard.

/// A caller-supplied value rejected before command execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("invalid {param}: {value:?} looks like a command-line flag")]
    FlagInjection { param: String, value: String },

    #[error("invalid port mapping {value:?}: {reason}")]
    InvalidPortMapping { value: String, reason: String },

    #[error("unsafe volume mount {value:?}: host path {host_path:?} is not allowed")]
    UnsafeVolumeMount { value: String, host_path: String },

    #[error("unsafe url {value:?}: {reason}")]
    UnsafeUrl { value: String, reason: String },

    #[error("unsafe header {name:?}: contains CR, LF, or NUL")]
    UnsafeHeader { name: String },

    #[error("method {method:?} is not allowed")]
    MethodNotAllowed { method: String },
}

impl GuardError {
    pub(crate) fn port(value: &str, reason: impl Into<String>) -> Self {
        GuardError::InvalidPortMapping {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn url(value: &str, reason: impl Into<String>) -> Self {
        GuardError::UnsafeUrl {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for guard checks.
pub type GuardResult<T = ()> = std::result::Result<T, GuardError>;
