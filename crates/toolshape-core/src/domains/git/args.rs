//! Guarded argument builders for git commands.

use serde::{Deserialize, Serialize};

use super::log::LOG_FORMAT;
use crate::guard::{assert_no_flag_injection, assert_no_flag_injection_all, GuardResult};

/// Caller parameters for `git log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogArgs {
    #[serde(default = "default_max_count")]
    pub max_count: usize,
    /// Revision or range, e.g. `main` or `v1.0..HEAD`.
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub paths: Vec<String>,
}

fn default_max_count() -> usize {
    20
}

impl Default for LogArgs {
    fn default() -> Self {
        Self {
            max_count: default_max_count(),
            revision: None,
            paths: Vec::new(),
        }
    }
}

/// `git log --max-count=N --format=<separated fields> [rev] [-- paths]`
pub fn log_args(args: &LogArgs) -> GuardResult<Vec<String>> {
    if let Some(rev) = &args.revision {
        assert_no_flag_injection(rev, "revision")?;
    }
    assert_no_flag_injection_all(&args.paths, "paths")?;

    let mut argv = vec![
        "log".to_string(),
        format!("--max-count={}", args.max_count),
        format!("--format={LOG_FORMAT}"),
    ];
    if let Some(rev) = &args.revision {
        argv.push(rev.clone());
    }
    if !args.paths.is_empty() {
        argv.push("--".to_string());
        argv.extend(args.paths.iter().cloned());
    }
    Ok(argv)
}

/// `git status --porcelain=v1 --branch [-- paths]`
pub fn status_args(paths: &[String]) -> GuardResult<Vec<String>> {
    assert_no_flag_injection_all(paths, "paths")?;
    let mut argv = vec![
        "status".to_string(),
        "--porcelain=v1".to_string(),
        "--branch".to_string(),
    ];
    if !paths.is_empty() {
        argv.push("--".to_string());
        argv.extend(paths.iter().cloned());
    }
    Ok(argv)
}

/// Caller parameters for `git push`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushArgs {
    #[serde(default)]
    pub remote: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub set_upstream: bool,
    #[serde(default)]
    pub force_with_lease: bool,
}

/// `git push [-u] [--force-with-lease] [remote [branch]]`
pub fn push_args(args: &PushArgs) -> GuardResult<Vec<String>> {
    if let Some(remote) = &args.remote {
        assert_no_flag_injection(remote, "remote")?;
    }
    if let Some(branch) = &args.branch {
        assert_no_flag_injection(branch, "branch")?;
    }

    let mut argv = vec!["push".to_string()];
    if args.set_upstream {
        argv.push("--set-upstream".to_string());
    }
    if args.force_with_lease {
        argv.push("--force-with-lease".to_string());
    }
    match (&args.remote, &args.branch) {
        (Some(remote), Some(branch)) => {
            argv.push(remote.clone());
            argv.push(branch.clone());
        }
        (Some(remote), None) => argv.push(remote.clone()),
        // A branch alone needs a remote to be positional.
        (None, Some(branch)) => {
            argv.push("origin".to_string());
            argv.push(branch.clone());
        }
        (None, None) => {}
    }
    Ok(argv)
}
