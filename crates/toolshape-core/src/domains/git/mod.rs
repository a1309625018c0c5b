//! Git.
//!
//! `log` and `status` share one error taxonomy; `push` has its own because
//! remote rejections need finer categories.

use std::sync::LazyLock;

use crate::classify::Classifier;

pub mod args;
pub mod log;
pub mod push;
pub mod status;

pub use args::{log_args, push_args, status_args, LogArgs, PushArgs};
pub use log::{parse_log, Commit, GitLog, FIELD_SEP, LOG_FORMAT, RECORD_SEP};
pub use push::{parse_push, GitPush, PushErrorKind, PUSH_ERRORS};
pub use status::{parse_status, FileChange, GitStatus};

crate::error_kinds! {
    /// Failure categories for read-only git commands.
    pub enum GitErrorKind {
        NotARepository => "not-a-repository",
        BadRevision => "bad-revision",
        NoCommits => "no-commits",
        Unknown => "unknown",
    }
}

pub static GIT_ERRORS: LazyLock<Classifier<GitErrorKind>> = LazyLock::new(|| {
    Classifier::new()
        .contains("not a git repository", GitErrorKind::NotARepository)
        .pattern(r"does not have any commits yet|your current branch '\S+' does not have any commits", GitErrorKind::NoCommits)
        .pattern(r"unknown revision|bad revision|ambiguous argument", GitErrorKind::BadRevision)
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier() {
        assert_eq!(
            GIT_ERRORS.classify("fatal: not a git repository (or any of the parent directories): .git"),
            GitErrorKind::NotARepository
        );
        assert_eq!(
            GIT_ERRORS.classify("fatal: your current branch 'main' does not have any commits yet"),
            GitErrorKind::NoCommits
        );
        assert_eq!(
            GIT_ERRORS.classify("fatal: ambiguous argument 'nope': unknown revision or path not in the working tree."),
            GitErrorKind::BadRevision
        );
    }
}
