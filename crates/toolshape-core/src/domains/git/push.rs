//! `git push`.
//!
//! Git writes push progress and the ref summary to stderr.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::classify::Classifier;
use crate::extract::{scan_lines, LineRule};
use crate::outcome::Outcome;
use crate::present::Present;
use crate::raw::RawInvocation;

crate::error_kinds! {
    /// Failure categories for `git push`.
    pub enum PushErrorKind {
        Rejected => "rejected",
        NoUpstream => "no-upstream",
        PermissionDenied => "permission-denied",
        RepositoryNotFound => "repository-not-found",
        HookDeclined => "hook-declined",
        Unknown => "unknown",
    }
}

/// Push error rules in priority order.
///
/// A declined pre-receive hook also prints `[remote rejected]`, and a missing
/// upstream mentions the push being refused, so both precede `rejected`.
/// Authentication failures are reported before rejection because the remote
/// never evaluated the refs.
pub static PUSH_ERRORS: LazyLock<Classifier<PushErrorKind>> = LazyLock::new(|| {
    Classifier::new()
        .pattern(r"hook declined|pre-receive hook|protected branch", PushErrorKind::HookDeclined)
        .pattern(r"has no upstream branch|no upstream configured|--set-upstream", PushErrorKind::NoUpstream)
        .pattern(
            r"repository not found|does not appear to be a git repository",
            PushErrorKind::RepositoryNotFound,
        )
        .pattern(
            r"permission denied|permission to \S+ denied|authentication failed|returned error: 403",
            PushErrorKind::PermissionDenied,
        )
        .pattern(r"\[rejected\]|\[remote rejected\]|non-fast-forward|failed to push some refs|fetch first", PushErrorKind::Rejected)
});

/// Result of `git push`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitPush {
    #[serde(flatten)]
    pub outcome: Outcome<PushErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Ref update line, e.g. `a1b2c3d..e4f5a6b  main -> main`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// The push created a new remote branch.
    pub created: bool,
    pub up_to_date: bool,
    /// Upstream configured by `--set-upstream`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitPushCompact {
    #[serde(flatten)]
    pub outcome: Outcome<PushErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created: bool,
    pub up_to_date: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking: Option<String>,
}

static REF_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*([+*!=\- ])?\s*(\[new branch\]|\[new tag\]|\[up to date\]|[0-9a-f]+\.\.\.?[0-9a-f]+)\s+(\S+)\s+->\s+(\S+)").ok()
});

static TRACKING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"set up to track '?([^'\s]+)'?").ok());

#[derive(Default)]
struct Accumulator {
    remote: Option<String>,
    branch: Option<String>,
    summary: Option<String>,
    created: bool,
    up_to_date: bool,
    tracking: Option<String>,
}

const LINE_RULES: &[LineRule<Accumulator>] = &[
    LineRule {
        name: "remote",
        apply: remote_line,
    },
    LineRule {
        name: "ref-update",
        apply: ref_line,
    },
    LineRule {
        name: "up-to-date",
        apply: up_to_date_line,
    },
    LineRule {
        name: "tracking",
        apply: tracking_line,
    },
];

fn remote_line(line: &str, acc: &mut Accumulator) -> bool {
    let Some(remote) = line.strip_prefix("To ") else {
        return false;
    };
    acc.remote = Some(remote.trim().to_string());
    true
}

fn ref_line(line: &str, acc: &mut Accumulator) -> bool {
    let Some(caps) = REF_LINE.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    let what = &caps[2];
    if what == "[new branch]" || what == "[new tag]" {
        acc.created = true;
    }
    if what == "[up to date]" {
        acc.up_to_date = true;
    }
    acc.branch = Some(caps[4].to_string());
    acc.summary = Some(format!("{what}  {} -> {}", &caps[3], &caps[4]));
    true
}

fn up_to_date_line(line: &str, acc: &mut Accumulator) -> bool {
    if line.trim() != "Everything up-to-date" {
        return false;
    }
    acc.up_to_date = true;
    true
}

fn tracking_line(line: &str, acc: &mut Accumulator) -> bool {
    let Some(caps) = TRACKING.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    acc.tracking = Some(caps[1].trim_end_matches('.').to_string());
    true
}

/// Parse `git push` output; `remote` and `branch` are the caller's request, used when
/// git does not echo them.
pub fn parse_push(raw: &RawInvocation, remote: Option<&str>, branch: Option<&str>) -> GitPush {
    let mut acc = Accumulator::default();
    scan_lines(&raw.stderr, LINE_RULES, &mut acc);
    scan_lines(&raw.stdout, LINE_RULES, &mut acc);

    GitPush {
        outcome: Outcome::from_invocation(raw, &PUSH_ERRORS),
        remote: acc.remote.or_else(|| remote.map(str::to_string)),
        branch: acc.branch.or_else(|| branch.map(str::to_string)),
        summary: acc.summary,
        created: acc.created,
        up_to_date: acc.up_to_date,
        tracking: acc.tracking,
    }
}

impl Present for GitPush {
    type Compact = GitPushCompact;

    fn format_full(&self) -> String {
        let mut out = format!("git push: {}\n", self.outcome.headline());
        if let Some(remote) = &self.remote {
            out.push_str(&format!("remote: {remote}\n"));
        }
        if let Some(summary) = &self.summary {
            out.push_str(&format!("  {summary}\n"));
        }
        if self.created {
            out.push_str("created new remote branch\n");
        }
        if self.up_to_date {
            out.push_str("everything up to date\n");
        }
        if let Some(tracking) = &self.tracking {
            out.push_str(&format!("tracking {tracking}\n"));
        }
        out
    }

    fn project_compact(&self) -> GitPushCompact {
        GitPushCompact {
            outcome: self.outcome.clone(),
            remote: self.remote.clone(),
            branch: self.branch.clone(),
            summary: self.summary.clone(),
            created: self.created,
            up_to_date: self.up_to_date,
            tracking: self.tracking.clone(),
        }
    }

    fn format_compact(compact: &GitPushCompact) -> String {
        if !compact.outcome.is_success() {
            return format!("push: {}\n", compact.outcome.headline());
        }
        if compact.up_to_date {
            return "push: up to date\n".to_string();
        }
        let branch = compact.branch.as_deref().unwrap_or("HEAD");
        let created = if compact.created { " (new branch)" } else { "" };
        let remote = compact.remote.as_deref().map(|r| format!(" to {r}")).unwrap_or_default();
        let mut out = match &compact.summary {
            Some(summary) => format!("pushed {branch}{created}{remote}: {summary}\n"),
            None => format!("pushed {branch}{created}{remote}\n"),
        };
        if let Some(tracking) = &compact.tracking {
            out.push_str(&format!("tracking {tracking}\n"));
        }
        out
    }
}
