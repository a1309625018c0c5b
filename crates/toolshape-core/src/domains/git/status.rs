//! `git status --porcelain=v1 --branch`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{GitErrorKind, GIT_ERRORS};
use crate::extract::{scan_lines, LineRule};
use crate::outcome::Outcome;
use crate::present::{cap, more_line, Present, COMPACT_LIST_LIMIT};
use crate::raw::RawInvocation;

/// A path with its two-letter porcelain code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub path: String,
    /// Source path of a rename or copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub code: String,
}

/// Result of `git status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStatus {
    #[serde(flatten)]
    pub outcome: Outcome<GitErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub detached: bool,
    pub staged: Vec<FileChange>,
    pub modified: Vec<FileChange>,
    pub untracked: Vec<String>,
    pub conflicted: Vec<String>,
    pub clean: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStatusCompact {
    #[serde(flatten)]
    pub outcome: Outcome<GitErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub detached: bool,
    pub staged: usize,
    pub modified: usize,
    pub untracked: usize,
    pub conflicted: usize,
    /// Up to ten changed paths, conflicts first.
    pub paths: Vec<String>,
    pub clean: bool,
}

static BRANCH_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^## (?:No commits yet on |Initial commit on )?(.+?)(?:\.\.\.(\S+))?(?: \[(.+)\])?$").ok()
});

static AHEAD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"ahead (\d+)").ok());
static BEHIND: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"behind (\d+)").ok());

const CONFLICT_CODES: [&str; 7] = ["DD", "AU", "UD", "UA", "DU", "AA", "UU"];

#[derive(Default)]
struct Accumulator {
    branch: Option<String>,
    upstream: Option<String>,
    ahead: u32,
    behind: u32,
    detached: bool,
    staged: Vec<FileChange>,
    modified: Vec<FileChange>,
    untracked: Vec<String>,
    conflicted: Vec<String>,
}

const LINE_RULES: &[LineRule<Accumulator>] = &[
    LineRule {
        name: "branch",
        apply: branch_line,
    },
    LineRule {
        name: "untracked",
        apply: untracked_line,
    },
    LineRule {
        name: "entry",
        apply: entry_line,
    },
];

fn count(re: &LazyLock<Option<Regex>>, text: &str) -> u32 {
    re.as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

fn branch_line(line: &str, acc: &mut Accumulator) -> bool {
    if !line.starts_with("## ") {
        return false;
    }
    if line.starts_with("## HEAD (no branch)") {
        acc.detached = true;
        return true;
    }
    let Some(caps) = BRANCH_LINE.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    acc.branch = Some(caps[1].to_string());
    acc.upstream = caps.get(2).map(|m| m.as_str().to_string());
    if let Some(tracking) = caps.get(3) {
        acc.ahead = count(&AHEAD, tracking.as_str());
        acc.behind = count(&BEHIND, tracking.as_str());
    }
    true
}

fn untracked_line(line: &str, acc: &mut Accumulator) -> bool {
    let Some(path) = line.strip_prefix("?? ") else {
        return false;
    };
    acc.untracked.push(unquote(path));
    true
}

fn entry_line(line: &str, acc: &mut Accumulator) -> bool {
    if line.len() < 4 || !line.is_char_boundary(2) || line.as_bytes()[2] != b' ' {
        return false;
    }
    let code = &line[..2];
    if code == "!!" {
        return true;
    }
    let rest = &line[3..];
    let (from, path) = match rest.split_once(" -> ") {
        Some((from, to)) => (Some(unquote(from)), unquote(to)),
        None => (None, unquote(rest)),
    };

    if CONFLICT_CODES.contains(&code) {
        acc.conflicted.push(path);
        return true;
    }

    let mut chars = code.chars();
    let (index, worktree) = (chars.next().unwrap_or(' '), chars.next().unwrap_or(' '));
    let change = FileChange {
        path,
        from,
        code: code.to_string(),
    };
    if index != ' ' && index != '?' {
        acc.staged.push(change.clone());
    }
    if worktree != ' ' {
        acc.modified.push(change);
    }
    true
}

/// Porcelain quotes paths with special characters.
fn unquote(path: &str) -> String {
    let path = path.trim();
    path.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .map(|p| p.replace("\\\"", "\"").replace("\\\\", "\\"))
        .unwrap_or_else(|| path.to_string())
}

/// Parse porcelain v1 status with the `##` branch header.
pub fn parse_status(raw: &RawInvocation) -> GitStatus {
    let mut acc = Accumulator::default();
    scan_lines(&raw.stdout, LINE_RULES, &mut acc);
    let clean = acc.staged.is_empty()
        && acc.modified.is_empty()
        && acc.untracked.is_empty()
        && acc.conflicted.is_empty();

    GitStatus {
        outcome: Outcome::from_invocation(raw, &GIT_ERRORS),
        branch: acc.branch,
        upstream: acc.upstream,
        ahead: acc.ahead,
        behind: acc.behind,
        detached: acc.detached,
        staged: acc.staged,
        modified: acc.modified,
        untracked: acc.untracked,
        conflicted: acc.conflicted,
        clean,
    }
}

impl GitStatus {
    fn branch_label(&self) -> String {
        match (&self.branch, self.detached) {
            (_, true) => "HEAD (detached)".to_string(),
            (Some(b), _) => b.clone(),
            (None, _) => "(unknown)".to_string(),
        }
    }
}

fn tracking(ahead: u32, behind: u32) -> String {
    match (ahead, behind) {
        (0, 0) => String::new(),
        (a, 0) => format!(" [ahead {a}]"),
        (0, b) => format!(" [behind {b}]"),
        (a, b) => format!(" [ahead {a}, behind {b}]"),
    }
}

impl Present for GitStatus {
    type Compact = GitStatusCompact;

    fn format_full(&self) -> String {
        let mut out = format!(
            "git status: {}, on {}{}{}\n",
            self.outcome.headline(),
            self.branch_label(),
            self.upstream
                .as_deref()
                .map(|u| format!(" tracking {u}"))
                .unwrap_or_default(),
            tracking(self.ahead, self.behind)
        );
        if self.clean {
            out.push_str("working tree clean\n");
            return out;
        }
        let mut section = |title: &str, paths: Vec<String>| {
            if !paths.is_empty() {
                out.push_str(&format!("{title}:\n"));
                for p in paths {
                    out.push_str(&format!("  {p}\n"));
                }
            }
        };
        section("conflicted", self.conflicted.clone());
        section(
            "staged",
            self.staged.iter().map(|c| format!("{} {}", c.code, c.path)).collect(),
        );
        section(
            "modified",
            self.modified.iter().map(|c| format!("{} {}", c.code, c.path)).collect(),
        );
        section("untracked", self.untracked.clone());
        out
    }

    fn project_compact(&self) -> GitStatusCompact {
        let mut paths: Vec<String> = Vec::new();
        let ordered = self
            .conflicted
            .iter()
            .chain(self.staged.iter().map(|c| &c.path))
            .chain(self.modified.iter().map(|c| &c.path))
            .chain(self.untracked.iter());
        for path in ordered {
            if !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        GitStatusCompact {
            outcome: self.outcome.clone(),
            branch: self.branch.clone(),
            upstream: self.upstream.clone(),
            ahead: self.ahead,
            behind: self.behind,
            detached: self.detached,
            staged: self.staged.len(),
            modified: self.modified.len(),
            untracked: self.untracked.len(),
            conflicted: self.conflicted.len(),
            paths: cap(&paths, COMPACT_LIST_LIMIT),
            clean: self.clean,
        }
    }

    fn format_compact(compact: &GitStatusCompact) -> String {
        let branch = compact.branch.as_deref().unwrap_or("(unknown)");
        if !compact.outcome.is_success() {
            return format!("git status: {}\n", compact.outcome.headline());
        }
        if compact.clean {
            return format!("{branch}{}: clean\n", tracking(compact.ahead, compact.behind));
        }
        let mut out = format!(
            "{branch}{}: {} staged, {} modified, {} untracked, {} conflicted\n",
            tracking(compact.ahead, compact.behind),
            compact.staged,
            compact.modified,
            compact.untracked,
            compact.conflicted
        );
        for p in &compact.paths {
            out.push_str(&format!("  {p}\n"));
        }
        let total = compact.staged + compact.modified + compact.untracked + compact.conflicted;
        if let Some(more) = more_line(total, compact.paths.len()) {
            out.push_str(&more);
            out.push('\n');
        }
        out
    }
}
