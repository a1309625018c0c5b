//! Runner error types.

use std::io;

/// Failures of the runner itself, as opposed to failures of the wrapped tool.
///
/// A tool that starts and exits non-zero is not an error here; it comes back
/// as a normal invocation with its exit code.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("command not found: {command}")]
    NotFound { command: String },

    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed waiting for {command}: {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
}

impl RunnerError {
    pub(crate) fn spawn(command: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            RunnerError::NotFound {
                command: command.to_string(),
            }
        } else {
            RunnerError::Spawn {
                command: command.to_string(),
                source,
            }
        }
    }
}

/// Result type for runner operations.
pub type RunnerResult<T> = std::result::Result<T, RunnerError>;
