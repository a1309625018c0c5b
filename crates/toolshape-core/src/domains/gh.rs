//! GitHub CLI pull requests.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::extract::json_object;
use crate::guard::{assert_no_flag_injection, GuardResult};
use crate::outcome::{ErrorKind, Outcome};
use crate::present::{preview, Present, PREVIEW_CHARS};
use crate::raw::RawInvocation;

crate::error_kinds! {
    pub enum GhErrorKind {
        AlreadyClosed => "already-closed",
        AlreadyMerged => "already-merged",
        NotFound => "not-found",
        PermissionDenied => "permission-denied",
        Unknown => "unknown",
    }
}

/// gh error rules in priority order. "already closed" messages also say the
/// pull request could not be found in some gh versions, so they come first.
pub static GH_ERRORS: LazyLock<Classifier<GhErrorKind>> = LazyLock::new(|| {
    Classifier::new()
        .contains("already closed", GhErrorKind::AlreadyClosed)
        .pattern(r"already merged|was merged|is merged", GhErrorKind::AlreadyMerged)
        .pattern(
            r"must have (?:push|write|admin) access|resource not accessible|permission denied|http 403|requires authentication",
            GhErrorKind::PermissionDenied,
        )
        .pattern(
            r"could not resolve to a pullrequest|no pull requests found|could not find pull request|not found",
            GhErrorKind::NotFound,
        )
});

/// JSON fields requested from `gh pr view`.
pub const VIEW_FIELDS: &str =
    "number,title,state,author,url,isDraft,headRefName,baseRefName,body,additions,deletions,changedFiles,mergeable,reviewDecision,labels";

/// How `gh pr merge` combines commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

/// Caller parameters for `gh pr` commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrArgs {
    /// Number, URL, or branch name.
    pub selector: String,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub method: MergeMethod,
    #[serde(default)]
    pub delete_branch: bool,
}

impl PrArgs {
    fn base(&self, verb: &str) -> GuardResult<Vec<String>> {
        assert_no_flag_injection(&self.selector, "selector")?;
        let mut argv = vec!["pr".to_string(), verb.to_string(), self.selector.clone()];
        if let Some(repo) = &self.repo {
            assert_no_flag_injection(repo, "repo")?;
            argv.push("--repo".to_string());
            argv.push(repo.clone());
        }
        Ok(argv)
    }
}

/// `gh pr view <selector> --json <fields>`
pub fn pr_view_args(args: &PrArgs) -> GuardResult<Vec<String>> {
    let mut argv = args.base("view")?;
    argv.push("--json".to_string());
    argv.push(VIEW_FIELDS.to_string());
    Ok(argv)
}

/// `gh pr close <selector> [--comment C] [--delete-branch]`
pub fn pr_close_args(args: &PrArgs) -> GuardResult<Vec<String>> {
    let mut argv = args.base("close")?;
    if let Some(comment) = &args.comment {
        // Passed as one argv element, so only a leading dash is dangerous.
        assert_no_flag_injection(comment, "comment")?;
        argv.push("--comment".to_string());
        argv.push(comment.clone());
    }
    if args.delete_branch {
        argv.push("--delete-branch".to_string());
    }
    Ok(argv)
}

/// `gh pr merge <selector> --merge|--squash|--rebase [--delete-branch]`
pub fn pr_merge_args(args: &PrArgs) -> GuardResult<Vec<String>> {
    let mut argv = args.base("merge")?;
    argv.push(
        match args.method {
            MergeMethod::Merge => "--merge",
            MergeMethod::Squash => "--squash",
            MergeMethod::Rebase => "--rebase",
        }
        .to_string(),
    );
    if args.delete_branch {
        argv.push("--delete-branch".to_string());
    }
    Ok(argv)
}

/// A pull request as reported by `gh pr view`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub author: String,
    pub url: String,
    pub draft: bool,
    pub head: String,
    pub base: String,
    pub body: String,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mergeable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_decision: Option<String>,
    pub labels: Vec<String>,
}

/// Result of `gh pr view`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrView {
    #[serde(flatten)]
    pub outcome: Outcome<GhErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<PullRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrViewCompact {
    #[serde(flatten)]
    pub outcome: Outcome<GhErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_files: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mergeable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_decision: Option<String>,
    /// First [`PREVIEW_CHARS`] characters of the body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_preview: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PullRequestDoc {
    number: u64,
    title: Option<String>,
    state: Option<String>,
    author: Option<AuthorDoc>,
    url: Option<String>,
    is_draft: bool,
    head_ref_name: Option<String>,
    base_ref_name: Option<String>,
    body: Option<String>,
    additions: u64,
    deletions: u64,
    changed_files: u64,
    mergeable: Option<String>,
    review_decision: Option<String>,
    labels: Vec<LabelDoc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthorDoc {
    login: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LabelDoc {
    name: String,
}

impl From<PullRequestDoc> for PullRequest {
    fn from(doc: PullRequestDoc) -> Self {
        let or_unknown = |v: Option<String>| v.filter(|s| !s.is_empty()).unwrap_or_else(|| "unknown".to_string());
        PullRequest {
            number: doc.number,
            title: doc.title.unwrap_or_default(),
            state: or_unknown(doc.state),
            author: or_unknown(doc.author.map(|a| a.login)),
            url: doc.url.unwrap_or_default(),
            draft: doc.is_draft,
            head: doc.head_ref_name.unwrap_or_default(),
            base: doc.base_ref_name.unwrap_or_default(),
            body: doc.body.unwrap_or_default(),
            additions: doc.additions,
            deletions: doc.deletions,
            changed_files: doc.changed_files,
            mergeable: doc.mergeable.filter(|m| !m.is_empty()),
            review_decision: doc.review_decision.filter(|r| !r.is_empty()),
            labels: doc.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

/// Parse `gh pr view --json` output.
pub fn parse_pr_view(raw: &RawInvocation) -> PrView {
    let pull_request = json_object::<PullRequestDoc>(&raw.stdout)
        .filter(|doc| doc.number > 0)
        .map(PullRequest::from);
    PrView {
        outcome: Outcome::from_invocation(raw, &GH_ERRORS),
        pull_request,
    }
}

impl Present for PrView {
    type Compact = PrViewCompact;

    fn format_full(&self) -> String {
        let Some(pr) = &self.pull_request else {
            return format!("gh pr view: {}\n", self.outcome.headline());
        };
        let mut out = format!(
            "#{} {} [{}{}]\n",
            pr.number,
            pr.title,
            pr.state,
            if pr.draft { ", draft" } else { "" }
        );
        out.push_str(&format!("{} wants to merge {} into {}\n", pr.author, pr.head, pr.base));
        out.push_str(&format!(
            "+{} -{} in {} file(s)\n",
            pr.additions, pr.deletions, pr.changed_files
        ));
        if let Some(decision) = &pr.review_decision {
            out.push_str(&format!("review: {decision}\n"));
        }
        if let Some(mergeable) = &pr.mergeable {
            out.push_str(&format!("mergeable: {mergeable}\n"));
        }
        if !pr.labels.is_empty() {
            out.push_str(&format!("labels: {}\n", pr.labels.join(", ")));
        }
        out.push_str(&format!("{}\n", pr.url));
        if !pr.body.trim().is_empty() {
            out.push('\n');
            out.push_str(pr.body.trim_end());
            out.push('\n');
        }
        out
    }

    fn project_compact(&self) -> PrViewCompact {
        let pr = self.pull_request.as_ref();
        PrViewCompact {
            outcome: self.outcome.clone(),
            number: pr.map(|p| p.number),
            title: pr.map(|p| p.title.clone()),
            state: pr.map(|p| p.state.clone()),
            author: pr.map(|p| p.author.clone()),
            url: pr.map(|p| p.url.clone()),
            draft: pr.map(|p| p.draft),
            head: pr.map(|p| p.head.clone()),
            base: pr.map(|p| p.base.clone()),
            additions: pr.map(|p| p.additions),
            deletions: pr.map(|p| p.deletions),
            changed_files: pr.map(|p| p.changed_files),
            mergeable: pr.and_then(|p| p.mergeable.clone()),
            review_decision: pr.and_then(|p| p.review_decision.clone()),
            body_preview: pr
                .map(|p| preview(&p.body, PREVIEW_CHARS))
                .filter(|b| !b.is_empty()),
        }
    }

    fn format_compact(compact: &PrViewCompact) -> String {
        match (compact.number, &compact.title) {
            (Some(number), Some(title)) => format!(
                "#{number} {title} [{}{}] {}\n{} -> {} by {}, +{}/-{}\n",
                compact.state.as_deref().unwrap_or("unknown"),
                if compact.draft == Some(true) { ", draft" } else { "" },
                compact.url.as_deref().unwrap_or_default(),
                compact.head.as_deref().unwrap_or_default(),
                compact.base.as_deref().unwrap_or_default(),
                compact.author.as_deref().unwrap_or("unknown"),
                compact.additions.unwrap_or(0),
                compact.deletions.unwrap_or(0)
            ),
            _ => format!("gh pr view: {}\n", compact.outcome.headline()),
        }
    }
}

/// Which mutating action produced a [`PrAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrActionKind {
    Close,
    Merge,
}

/// Result of `gh pr close` or `gh pr merge`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrAction {
    #[serde(flatten)]
    pub outcome: Outcome<GhErrorKind>,
    pub action: PrActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub branch_deleted: bool,
}

static PR_REF: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)pull request (?:\S+)?#(\d+)(?: \((.*)\))?").ok());

/// Parse `gh pr close` / `gh pr merge` output.
///
/// gh reports an already closed or merged pull request as a warning with a
/// zero exit status; those are still failures here.
pub fn parse_pr_action(action: PrActionKind, raw: &RawInvocation) -> PrAction {
    let combined = raw.combined();
    let (number, title) = PR_REF
        .as_ref()
        .and_then(|re| re.captures(&combined))
        .map(|caps| {
            (
                caps[1].parse().ok(),
                caps.get(2).map(|t| t.as_str().trim().to_string()),
            )
        })
        .unwrap_or((None, None));

    let outcome = match Outcome::from_invocation(raw, &GH_ERRORS) {
        Outcome::Succeeded => {
            let kind = GH_ERRORS.classify(&combined);
            if matches!(kind, GhErrorKind::AlreadyClosed | GhErrorKind::AlreadyMerged) {
                Outcome::failed(kind, raw.failure_message())
            } else {
                Outcome::Succeeded
            }
        }
        failed => failed,
    };

    PrAction {
        outcome,
        action,
        number,
        title,
        branch_deleted: combined.contains("Deleted branch") || combined.contains("Deleted local branch"),
    }
}

impl Present for PrAction {
    type Compact = PrAction;

    fn format_full(&self) -> String {
        Self::format_compact(self)
    }

    /// The result is already minimal.
    fn project_compact(&self) -> PrAction {
        self.clone()
    }

    fn format_compact(compact: &PrAction) -> String {
        let verb = match compact.action {
            PrActionKind::Close => "closed",
            PrActionKind::Merge => "merged",
        };
        let target = match (compact.number, &compact.title) {
            (Some(n), Some(t)) => format!("#{n} ({t})"),
            (Some(n), None) => format!("#{n}"),
            _ => "pull request".to_string(),
        };
        match &compact.outcome {
            Outcome::Succeeded => {
                let deleted = if compact.branch_deleted { ", branch deleted" } else { "" };
                format!("{verb} {target}{deleted}\n")
            }
            failed => format!(
                "{} {target}: {}\n",
                match compact.action {
                    PrActionKind::Close => "close",
                    PrActionKind::Merge => "merge",
                },
                failed.kind().map_or(GhErrorKind::UNKNOWN.as_str(), |k| k.as_str())
            ),
        }
    }
}
