//! Raw process output handed over by the process runner.

use serde::{Deserialize, Serialize};

/// Exit code runners report when a command was killed at its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Captured output of a single external command invocation.
///
/// Produced by a process runner and consumed once by a domain parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInvocation {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    #[serde(default)]
    pub timed_out: bool,
}

impl RawInvocation {
    /// Create a raw invocation that did not time out.
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            timed_out: false,
        }
    }

    /// Mark this invocation as timed out.
    pub fn with_timeout(mut self) -> Self {
        self.timed_out = true;
        self
    }

    /// Whether the runner flagged a timeout, either explicitly or through the sentinel exit code.
    pub fn is_timeout(&self) -> bool {
        self.timed_out || self.exit_code == TIMEOUT_EXIT_CODE
    }

    /// Zero exit status and no timeout.
    pub fn succeeded(&self) -> bool {
        !self.is_timeout() && self.exit_code == 0
    }

    /// `stdout` and `stderr` joined by a newline; the classifier input.
    pub fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        text.push_str(&self.stdout);
        text.push('\n');
        text.push_str(&self.stderr);
        text
    }

    /// Text a human would have seen in the terminal, used by the presentation size policy.
    pub fn raw_text(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, false) => self.stderr.trim_end().to_string(),
            (true, true) => String::new(),
        }
    }

    /// Best-effort one-paragraph failure description.
    ///
    /// Prefers stderr, then stdout, then the exit code. Timeouts are always prefixed with
    /// `timed out` so that callers can recognise them without a dedicated error kind.
    pub fn failure_message(&self) -> String {
        let detail = if !self.stderr.trim().is_empty() {
            self.stderr.trim().to_string()
        } else if !self.stdout.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            format!("command exited with code {}", self.exit_code)
        };

        if self.is_timeout() {
            format!("timed out: {detail}")
        } else {
            detail
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_via_flag_or_sentinel() {
        assert!(RawInvocation::new("", "", 0).with_timeout().is_timeout());
        assert!(RawInvocation::new("", "", TIMEOUT_EXIT_CODE).is_timeout());
        assert!(!RawInvocation::new("", "", 1).is_timeout());
    }

    #[test]
    fn test_succeeded_requires_zero_exit_and_no_timeout() {
        assert!(RawInvocation::new("ok", "", 0).succeeded());
        assert!(!RawInvocation::new("ok", "", 2).succeeded());
        assert!(!RawInvocation::new("ok", "", 0).with_timeout().succeeded());
    }

    #[test]
    fn test_failure_message_prefers_stderr() {
        let raw = RawInvocation::new("out", "  boom\n", 1);
        assert_eq!(raw.failure_message(), "boom");

        let raw = RawInvocation::new("only stdout", "", 1);
        assert_eq!(raw.failure_message(), "only stdout");

        let raw = RawInvocation::new("", "", 3);
        assert_eq!(raw.failure_message(), "command exited with code 3");
    }

    #[test]
    fn test_failure_message_marks_timeouts() {
        let raw = RawInvocation::new("partial", "", TIMEOUT_EXIT_CODE);
        assert!(raw.failure_message().starts_with("timed out"));
    }

    #[test]
    fn test_raw_text_joins_streams() {
        let raw = RawInvocation::new("a\n", "b\n", 0);
        assert_eq!(raw.raw_text(), "a\nb");
        assert_eq!(RawInvocation::default().raw_text(), "");
    }
}
