//! Helm releases.
//!
//! One [`HelmResult`] variant per action, so a list never carries a single
//! release and an uninstall never carries a revision.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::extract::{json_array, json_object, scan_lines, LineRule};
use crate::guard::{assert_no_flag_injection, assert_no_flag_injection_all, GuardResult};
use crate::outcome::Outcome;
use crate::present::{cap_map, more_line, Present, COMPACT_LIST_LIMIT};
use crate::raw::RawInvocation;

crate::error_kinds! {
    pub enum HelmErrorKind {
        ReleaseNotFound => "release-not-found",
        AlreadyExists => "already-exists",
        ClusterUnreachable => "cluster-unreachable",
        ChartNotFound => "chart-not-found",
        Unknown => "unknown",
    }
}

/// Helm error rules in priority order. Several messages end in `not found`,
/// so the specific forms come before the release rule.
pub static HELM_ERRORS: LazyLock<Classifier<HelmErrorKind>> = LazyLock::new(|| {
    Classifier::new()
        .pattern(
            r"cannot re-use a name that is still in use|already exists",
            HelmErrorKind::AlreadyExists,
        )
        .pattern(
            r"kubernetes cluster unreachable|connection refused|no such host|unable to connect",
            HelmErrorKind::ClusterUnreachable,
        )
        .pattern(
            r"chart .*not found|failed to download|no chart version found|repo \S+ not found|path \S+ not found|not a valid chart repository",
            HelmErrorKind::ChartNotFound,
        )
        .pattern(r"release: not found|release \S+ not found|not found", HelmErrorKind::ReleaseNotFound)
});

/// Which helm action to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelmAction {
    List,
    Status,
    Install,
    Upgrade,
    Uninstall,
}

/// Caller parameters for helm commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmArgs {
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub chart: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// `key=value` pairs for `--set`.
    #[serde(default)]
    pub set: Vec<String>,
    #[serde(default)]
    pub values_files: Vec<String>,
}

impl HelmArgs {
    fn release(&self) -> GuardResult<String> {
        let release = self.release.clone().unwrap_or_default();
        assert_no_flag_injection(&release, "release")?;
        Ok(release)
    }

    fn chart(&self) -> GuardResult<String> {
        let chart = self.chart.clone().unwrap_or_default();
        assert_no_flag_injection(&chart, "chart")?;
        Ok(chart)
    }
}

/// Build the argv for `action`.
pub fn helm_args(action: HelmAction, args: &HelmArgs) -> GuardResult<Vec<String>> {
    if let Some(ns) = &args.namespace {
        assert_no_flag_injection(ns, "namespace")?;
    }
    let mut argv = match action {
        HelmAction::List => vec!["list".to_string()],
        HelmAction::Status => vec!["status".to_string(), args.release()?],
        HelmAction::Install => vec!["install".to_string(), args.release()?, args.chart()?],
        HelmAction::Upgrade => vec![
            "upgrade".to_string(),
            args.release()?,
            args.chart()?,
        ],
        HelmAction::Uninstall => vec!["uninstall".to_string(), args.release()?],
    };
    if matches!(action, HelmAction::Install | HelmAction::Upgrade) {
        if let Some(version) = &args.version {
            assert_no_flag_injection(version, "version")?;
            argv.push("--version".to_string());
            argv.push(version.clone());
        }
        assert_no_flag_injection_all(&args.set, "set")?;
        for pair in &args.set {
            argv.push("--set".to_string());
            argv.push(pair.clone());
        }
        assert_no_flag_injection_all(&args.values_files, "values")?;
        for file in &args.values_files {
            argv.push("--values".to_string());
            argv.push(file.clone());
        }
    }
    match &args.namespace {
        Some(ns) => {
            argv.push("--namespace".to_string());
            argv.push(ns.clone());
        }
        None if action == HelmAction::List => argv.push("--all-namespaces".to_string()),
        None => {}
    }
    if action != HelmAction::Uninstall {
        argv.push("--output".to_string());
        argv.push("json".to_string());
    }
    Ok(argv)
}

/// A helm release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub revision: u32,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Result of a helm command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum HelmResult {
    List {
        #[serde(flatten)]
        outcome: Outcome<HelmErrorKind>,
        releases: Vec<Release>,
    },
    Status {
        #[serde(flatten)]
        outcome: Outcome<HelmErrorKind>,
        release: Option<Release>,
    },
    Install {
        #[serde(flatten)]
        outcome: Outcome<HelmErrorKind>,
        release: Option<Release>,
    },
    Upgrade {
        #[serde(flatten)]
        outcome: Outcome<HelmErrorKind>,
        release: Option<Release>,
    },
    Uninstall {
        #[serde(flatten)]
        outcome: Outcome<HelmErrorKind>,
        name: String,
    },
}

impl HelmResult {
    pub fn outcome(&self) -> &Outcome<HelmErrorKind> {
        match self {
            HelmResult::List { outcome, .. }
            | HelmResult::Status { outcome, .. }
            | HelmResult::Install { outcome, .. }
            | HelmResult::Upgrade { outcome, .. }
            | HelmResult::Uninstall { outcome, .. } => outcome,
        }
    }

    pub fn action(&self) -> HelmAction {
        match self {
            HelmResult::List { .. } => HelmAction::List,
            HelmResult::Status { .. } => HelmAction::Status,
            HelmResult::Install { .. } => HelmAction::Install,
            HelmResult::Upgrade { .. } => HelmAction::Upgrade,
            HelmResult::Uninstall { .. } => HelmAction::Uninstall,
        }
    }
}

/// Compact projection: releases reduced to name, status and revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum HelmCompact {
    List {
        #[serde(flatten)]
        outcome: Outcome<HelmErrorKind>,
        releases: Vec<ReleaseSummary>,
        total: usize,
    },
    Status {
        #[serde(flatten)]
        outcome: Outcome<HelmErrorKind>,
        release: Option<ReleaseSummary>,
    },
    Install {
        #[serde(flatten)]
        outcome: Outcome<HelmErrorKind>,
        release: Option<ReleaseSummary>,
    },
    Upgrade {
        #[serde(flatten)]
        outcome: Outcome<HelmErrorKind>,
        release: Option<ReleaseSummary>,
    },
    Uninstall {
        #[serde(flatten)]
        outcome: Outcome<HelmErrorKind>,
        name: String,
    },
}

/// Release as the compact view shows it; notes stay in the full result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub status: String,
    pub revision: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,
}

impl From<&Release> for ReleaseSummary {
    fn from(r: &Release) -> Self {
        Self {
            name: r.name.clone(),
            namespace: r.namespace.clone(),
            status: r.status.clone(),
            revision: r.revision,
            chart: r.chart.clone(),
        }
    }
}

// Wire shapes. `helm list -o json` prints revision as a string; status
// documents nest everything under `info` and `chart.metadata`.

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RevisionField {
    Number(u32),
    Text(String),
}

impl RevisionField {
    fn value(&self) -> u32 {
        match self {
            RevisionField::Number(n) => *n,
            RevisionField::Text(t) => t.trim().parse().unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListEntryDoc {
    name: String,
    namespace: Option<String>,
    revision: Option<RevisionField>,
    updated: Option<String>,
    status: Option<String>,
    chart: Option<String>,
    app_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDoc {
    name: String,
    namespace: Option<String>,
    version: Option<RevisionField>,
    #[serde(default)]
    info: InfoDoc,
    chart: Option<ChartDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct InfoDoc {
    status: Option<String>,
    last_deployed: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartDoc {
    metadata: Option<ChartMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMetadata {
    name: Option<String>,
    version: Option<String>,
    app_version: Option<String>,
}

fn unknown_if_empty(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

impl From<ListEntryDoc> for Release {
    fn from(doc: ListEntryDoc) -> Self {
        Release {
            name: doc.name,
            namespace: doc.namespace,
            revision: doc.revision.as_ref().map_or(0, RevisionField::value),
            status: unknown_if_empty(doc.status),
            chart: doc.chart,
            app_version: doc.app_version,
            updated: doc.updated,
            notes: None,
        }
    }
}

impl From<ReleaseDoc> for Release {
    fn from(doc: ReleaseDoc) -> Self {
        let metadata = doc.chart.and_then(|c| c.metadata);
        let chart = metadata.as_ref().and_then(|m| match (&m.name, &m.version) {
            (Some(name), Some(version)) => Some(format!("{name}-{version}")),
            (Some(name), None) => Some(name.clone()),
            _ => None,
        });
        Release {
            name: doc.name,
            namespace: doc.namespace,
            revision: doc.version.as_ref().map_or(0, RevisionField::value),
            status: unknown_if_empty(doc.info.status),
            chart,
            app_version: metadata.and_then(|m| m.app_version),
            updated: doc.info.last_deployed,
            notes: doc.info.notes.filter(|n| !n.trim().is_empty()),
        }
    }
}

fn list_from_json(raw: &RawInvocation) -> Option<Vec<Release>> {
    let docs: Vec<ListEntryDoc> = json_array(&raw.stdout)?;
    Some(docs.into_iter().map(Release::from).collect())
}

/// `helm list` default table: tab-separated columns padded with spaces.
fn list_from_table(raw: &RawInvocation) -> Option<Vec<Release>> {
    let mut lines = raw.stdout.lines().skip_while(|l| !l.starts_with("NAME"));
    let header: Vec<String> = lines
        .next()?
        .split('\t')
        .map(|h| h.trim().to_string())
        .collect();
    let column = |cells: &[&str], name: &str| -> Option<String> {
        header
            .iter()
            .position(|h| h == name)
            .and_then(|i| cells.get(i))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    };
    let releases = lines
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let cells: Vec<&str> = line.split('\t').collect();
            Release {
                name: column(&cells, "NAME").unwrap_or_else(|| "unknown".to_string()),
                namespace: column(&cells, "NAMESPACE"),
                revision: column(&cells, "REVISION").and_then(|r| r.parse().ok()).unwrap_or(0),
                status: unknown_if_empty(column(&cells, "STATUS")),
                chart: column(&cells, "CHART"),
                app_version: column(&cells, "APP VERSION"),
                updated: column(&cells, "UPDATED"),
                notes: None,
            }
        })
        .collect();
    Some(releases)
}

fn release_from_json(raw: &RawInvocation) -> Option<Release> {
    json_object::<ReleaseDoc>(&raw.stdout).map(Release::from)
}

#[derive(Default)]
struct TextRelease {
    release: Release,
    seen: bool,
    in_notes: bool,
    notes: Vec<String>,
}

const STATUS_RULES: &[LineRule<TextRelease>] = &[
    LineRule {
        name: "notes-body",
        apply: notes_body,
    },
    LineRule {
        name: "field",
        apply: status_field,
    },
];

fn notes_body(line: &str, acc: &mut TextRelease) -> bool {
    if !acc.in_notes {
        return false;
    }
    acc.notes.push(line.to_string());
    true
}

fn status_field(line: &str, acc: &mut TextRelease) -> bool {
    let Some((key, value)) = line.split_once(':') else {
        return false;
    };
    let value = value.trim().to_string();
    match key.trim() {
        "NAME" => acc.release.name = value,
        "NAMESPACE" => acc.release.namespace = Some(value),
        "STATUS" => acc.release.status = value,
        "REVISION" => acc.release.revision = value.parse().unwrap_or(0),
        "LAST DEPLOYED" => acc.release.updated = Some(value),
        "CHART" => acc.release.chart = Some(value),
        "APP VERSION" => acc.release.app_version = Some(value),
        "NOTES" => acc.in_notes = true,
        _ => return false,
    }
    acc.seen = true;
    true
}

fn release_from_text(raw: &RawInvocation) -> Option<Release> {
    let mut acc = TextRelease::default();
    scan_lines(&raw.stdout, STATUS_RULES, &mut acc);
    if !acc.seen || acc.release.name.is_empty() {
        return None;
    }
    let mut release = acc.release;
    if release.status.is_empty() {
        release.status = "unknown".to_string();
    }
    let notes = acc.notes.join("\n");
    release.notes = Some(notes.trim().to_string()).filter(|n| !n.is_empty());
    Some(release)
}

/// Parse output of `helm <action>`; `release` is the requested release name.
pub fn parse_helm(action: HelmAction, raw: &RawInvocation, release: Option<&str>) -> HelmResult {
    let outcome = Outcome::from_invocation(raw, &HELM_ERRORS);
    let single = || release_from_json(raw).or_else(|| release_from_text(raw));
    match action {
        HelmAction::List => HelmResult::List {
            outcome,
            releases: list_from_json(raw)
                .or_else(|| list_from_table(raw))
                .unwrap_or_default(),
        },
        HelmAction::Status => HelmResult::Status {
            outcome,
            release: single(),
        },
        HelmAction::Install => HelmResult::Install {
            outcome,
            release: single(),
        },
        HelmAction::Upgrade => HelmResult::Upgrade {
            outcome,
            release: single(),
        },
        HelmAction::Uninstall => HelmResult::Uninstall {
            outcome,
            name: release.map(str::to_string).unwrap_or_else(|| {
                uninstalled_name(&raw.stdout).unwrap_or_else(|| "unknown".to_string())
            }),
        },
    }
}

/// `release "web" uninstalled`
fn uninstalled_name(text: &str) -> Option<String> {
    let line = text.lines().find(|l| l.contains("uninstalled"))?;
    let start = line.find('"')? + 1;
    let end = start + line[start..].find('"')?;
    Some(line[start..end].to_string())
}

fn release_line(r: &Release) -> String {
    format!(
        "{}{} rev {} {}{}",
        r.namespace.as_deref().map(|ns| format!("{ns}/")).unwrap_or_default(),
        r.name,
        r.revision,
        r.status,
        r.chart.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
    )
}

impl Present for HelmResult {
    type Compact = HelmCompact;

    fn format_full(&self) -> String {
        let label = match self.action() {
            HelmAction::List => "helm list",
            HelmAction::Status => "helm status",
            HelmAction::Install => "helm install",
            HelmAction::Upgrade => "helm upgrade",
            HelmAction::Uninstall => "helm uninstall",
        };
        let mut out = format!("{label}: {}\n", self.outcome().headline());
        match self {
            HelmResult::List { releases, .. } => {
                for r in releases {
                    out.push_str(&release_line(r));
                    if let Some(updated) = &r.updated {
                        out.push_str(&format!(", updated {updated}"));
                    }
                    out.push('\n');
                }
            }
            HelmResult::Status { release, .. }
            | HelmResult::Install { release, .. }
            | HelmResult::Upgrade { release, .. } => {
                if let Some(r) = release {
                    out.push_str(&release_line(r));
                    out.push('\n');
                    if let Some(notes) = &r.notes {
                        out.push_str("notes:\n");
                        out.push_str(notes);
                        out.push('\n');
                    }
                }
            }
            HelmResult::Uninstall { name, .. } => {
                out.push_str(&format!("release {name}\n"));
            }
        }
        out
    }

    fn project_compact(&self) -> HelmCompact {
        let summary = |r: &Option<Release>| r.as_ref().map(ReleaseSummary::from);
        match self {
            HelmResult::List { outcome, releases } => HelmCompact::List {
                outcome: outcome.clone(),
                releases: cap_map(releases, COMPACT_LIST_LIMIT, |r| ReleaseSummary::from(r)),
                total: releases.len(),
            },
            HelmResult::Status { outcome, release } => HelmCompact::Status {
                outcome: outcome.clone(),
                release: summary(release),
            },
            HelmResult::Install { outcome, release } => HelmCompact::Install {
                outcome: outcome.clone(),
                release: summary(release),
            },
            HelmResult::Upgrade { outcome, release } => HelmCompact::Upgrade {
                outcome: outcome.clone(),
                release: summary(release),
            },
            HelmResult::Uninstall { outcome, name } => HelmCompact::Uninstall {
                outcome: outcome.clone(),
                name: name.clone(),
            },
        }
    }

    fn format_compact(compact: &HelmCompact) -> String {
        let one = |verb: &str, outcome: &Outcome<HelmErrorKind>, r: &Option<ReleaseSummary>| match (outcome, r) {
            (Outcome::Succeeded, Some(r)) => format!("{verb} {}: {} (rev {})\n", r.name, r.status, r.revision),
            (outcome, _) => format!("{verb}: {}\n", outcome.headline()),
        };
        match compact {
            HelmCompact::List {
                outcome,
                releases,
                total,
            } => {
                let mut out = format!("helm list: {}, {total} release(s)\n", outcome.headline());
                for r in releases {
                    out.push_str(&format!("{} {} rev {}\n", r.name, r.status, r.revision));
                }
                if let Some(more) = more_line(*total, releases.len()) {
                    out.push_str(&more);
                    out.push('\n');
                }
                out
            }
            HelmCompact::Status { outcome, release } => one("status", outcome, release),
            HelmCompact::Install { outcome, release } => one("installed", outcome, release),
            HelmCompact::Upgrade { outcome, release } => one("upgraded", outcome, release),
            HelmCompact::Uninstall { outcome, name } => match outcome {
                Outcome::Succeeded => format!("uninstalled {name}\n"),
                failed => format!("uninstall {name}: {}\n", failed.headline()),
            },
        }
    }
}
