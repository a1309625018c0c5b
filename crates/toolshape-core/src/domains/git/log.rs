//! `git log` with separator-delimited fields.
//!
//! Fields are joined by the ASCII unit separator and commits end with the
//! record separator, so subjects containing any printable character survive
//! intact.

use serde::Serialize;

use super::{GitErrorKind, GIT_ERRORS};
use crate::ident::is_hex;
use crate::outcome::Outcome;
use crate::present::{cap_map, more_line, Present, COMPACT_LIST_LIMIT};
use crate::raw::RawInvocation;

pub const FIELD_SEP: char = '\u{1f}';
pub const RECORD_SEP: char = '\u{1e}';

/// `--format` value: hash, short hash, author, email, ISO date, subject, refs.
pub const LOG_FORMAT: &str = "%H%x1f%h%x1f%an%x1f%ae%x1f%aI%x1f%s%x1f%D%x1e";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub hash: String,
    pub short_hash: String,
    pub author: String,
    pub email: String,
    pub date: String,
    pub subject: String,
    pub refs: Vec<String>,
}

/// Result of `git log`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitLog {
    #[serde(flatten)]
    pub outcome: Outcome<GitErrorKind>,
    pub commits: Vec<Commit>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitLogCompact {
    #[serde(flatten)]
    pub outcome: Outcome<GitErrorKind>,
    pub commits: Vec<CommitSummary>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSummary {
    pub short_hash: String,
    pub subject: String,
}

fn parse_record(record: &str) -> Option<Commit> {
    let record = record.trim_start_matches(['\n', '\r']);
    // A record without any field separator is not ours, whatever it says.
    if !record.contains(FIELD_SEP) {
        return None;
    }
    let mut fields = record.split(FIELD_SEP);
    let hash = fields.next()?.trim().to_string();
    if !is_hex(&hash) {
        return None;
    }
    let mut next = || fields.next().map(|f| f.trim().to_string()).unwrap_or_default();
    let short_hash = next();
    let author = next();
    let email = next();
    let date = next();
    let subject = next();
    let refs = next()
        .split(", ")
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();

    Some(Commit {
        short_hash: if short_hash.is_empty() {
            hash.chars().take(7).collect()
        } else {
            short_hash
        },
        hash,
        author,
        email,
        date,
        subject,
        refs,
    })
}

/// Parse `git log --format=LOG_FORMAT` output.
pub fn parse_log(raw: &RawInvocation) -> GitLog {
    let commits: Vec<Commit> = raw.stdout.split(RECORD_SEP).filter_map(parse_record).collect();
    GitLog {
        outcome: Outcome::from_invocation(raw, &GIT_ERRORS),
        total: commits.len(),
        commits,
    }
}

impl Present for GitLog {
    type Compact = GitLogCompact;

    fn format_full(&self) -> String {
        let mut out = format!("git log: {}, {} commit(s)\n", self.outcome.headline(), self.total);
        for c in &self.commits {
            out.push_str(&format!("{} {} <{}> {}\n", c.hash, c.author, c.email, c.date));
            if !c.refs.is_empty() {
                out.push_str(&format!("  ({})\n", c.refs.join(", ")));
            }
            out.push_str(&format!("  {}\n", c.subject));
        }
        out
    }

    fn project_compact(&self) -> GitLogCompact {
        GitLogCompact {
            outcome: self.outcome.clone(),
            commits: cap_map(&self.commits, COMPACT_LIST_LIMIT, |c| CommitSummary {
                short_hash: c.short_hash.clone(),
                subject: c.subject.clone(),
            }),
            total: self.total,
        }
    }

    fn format_compact(compact: &GitLogCompact) -> String {
        let mut out = String::new();
        if !compact.outcome.is_success() {
            out.push_str(&format!("git log: {}\n", compact.outcome.headline()));
        }
        for c in &compact.commits {
            out.push_str(&format!("{} {}\n", c.short_hash, c.subject));
        }
        if let Some(more) = more_line(compact.total, compact.commits.len()) {
            out.push_str(&more);
            out.push('\n');
        }
        out
    }
}
