//! Runner configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default per-invocation timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Default cap on captured bytes per stream.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Defaults applied to every invocation unless the call overrides them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerConfig {
    /// Kill the child after this many milliseconds.
    pub timeout_ms: u64,

    /// Working directory; `None` inherits the caller's.
    pub cwd: Option<PathBuf>,

    /// Bytes kept per stream; the rest is read and discarded.
    pub max_output_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            cwd: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_config_default() {
        let config = RunnerConfig::default();
        assert_eq!(config.timeout_ms, 60_000);
        assert!(config.cwd.is_none());
        assert_eq!(config.max_output_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_runner_config_partial_json_keeps_defaults() {
        let config: RunnerConfig = serde_json::from_str(r#"{"timeoutMs": 500}"#).unwrap();
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.max_output_bytes, DEFAULT_MAX_OUTPUT_BYTES);
    }
}
