//! `npm install`.
//!
//! `npm install --json` prints one summary object; older npm versions and
//! non-JSON runs print a handful of summary sentences instead.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::extract::{json_object, scan_lines, LineRule};
use crate::guard::{assert_no_flag_injection_all, GuardResult};
use crate::outcome::Outcome;
use crate::present::Present;
use crate::raw::RawInvocation;
use crate::units::{format_secs, parse_duration_secs};

crate::error_kinds! {
    pub enum NpmErrorKind {
        Network => "network",
        PeerDependencyConflict => "peer-dependency-conflict",
        PackageNotFound => "package-not-found",
        PermissionDenied => "permission-denied",
        Unknown => "unknown",
    }
}

/// npm error rules in priority order. Resolution failures are checked first
/// because their trees quote registry URLs.
pub static NPM_ERRORS: LazyLock<Classifier<NpmErrorKind>> = LazyLock::new(|| {
    Classifier::new()
        .pattern(
            r"\beresolve\b|unable to resolve dependency tree|could not resolve dependency|conflicting peer dependency",
            NpmErrorKind::PeerDependencyConflict,
        )
        .pattern(r"\beacces\b|\beperm\b|permission denied", NpmErrorKind::PermissionDenied)
        .pattern(r"\be404\b|404 not found|is not in this registry|no matching version", NpmErrorKind::PackageNotFound)
        .pattern(
            r"\benotfound\b|\betimedout\b|\beconnrefused\b|\beconnreset\b|\beai_again\b|network connectivity|request to \S+ failed",
            NpmErrorKind::Network,
        )
});

/// Caller parameters for `npm install`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallArgs {
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub dev: bool,
}

/// `npm install --json [--save-dev] [packages]`
pub fn install_args(args: &InstallArgs) -> GuardResult<Vec<String>> {
    assert_no_flag_injection_all(&args.packages, "packages")?;
    let mut argv = vec!["install".to_string(), "--json".to_string()];
    if args.dev {
        argv.push("--save-dev".to_string());
    }
    argv.extend(args.packages.iter().cloned());
    Ok(argv)
}

/// Audit vulnerability counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vulnerabilities {
    pub info: u32,
    pub low: u32,
    pub moderate: u32,
    pub high: u32,
    pub critical: u32,
    pub total: u32,
}

impl Vulnerabilities {
    fn with_total(mut self) -> Self {
        if self.total == 0 {
            self.total = self.info + self.low + self.moderate + self.high + self.critical;
        }
        self
    }

    fn breakdown(&self) -> String {
        let parts: Vec<String> = [
            ("critical", self.critical),
            ("high", self.high),
            ("moderate", self.moderate),
            ("low", self.low),
            ("info", self.info),
        ]
        .iter()
        .filter(|(_, n)| *n > 0)
        .map(|(name, n)| format!("{n} {name}"))
        .collect();
        parts.join(", ")
    }
}

/// Result of `npm install`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NpmInstall {
    #[serde(flatten)]
    pub outcome: Outcome<NpmErrorKind>,
    pub added: u32,
    pub removed: u32,
    pub changed: u32,
    pub audited: u32,
    pub funding: u32,
    pub vulnerabilities: Vulnerabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NpmInstallCompact {
    #[serde(flatten)]
    pub outcome: Outcome<NpmErrorKind>,
    pub added: u32,
    pub removed: u32,
    pub changed: u32,
    pub audited: u32,
    /// Sum of the per-severity counts.
    pub vulnerabilities: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InstallDoc {
    added: Option<u32>,
    removed: Option<u32>,
    changed: Option<u32>,
    audited: Option<u32>,
    funding: Option<u32>,
    vulnerabilities: Option<Vulnerabilities>,
    audit: Option<AuditDoc>,
    error: Option<ErrorDoc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuditDoc {
    metadata: Option<AuditMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuditMetadata {
    vulnerabilities: Option<Vulnerabilities>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorDoc {
    code: Option<String>,
    summary: Option<String>,
}

#[derive(Default)]
struct Summary {
    added: u32,
    removed: u32,
    changed: u32,
    audited: u32,
    funding: u32,
    vulnerabilities: Vulnerabilities,
    duration_secs: Option<f64>,
    json_error: Option<String>,
}

static COUNT_CLAUSE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(added|removed|changed|audited) (\d+) packages?").ok());

static DURATION_CLAUSE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"packages? in (\S+)\s*$").ok());

static FUNDING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d+) packages? (?:are|is) looking for funding").ok());

static VULN_TOTAL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:found )?(\d+) vulnerabilit(?:y|ies)(?: \(([^)]*)\))?").ok());

static SEVERITY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+) (info|low|moderate|high|critical)").ok());

const LINE_RULES: &[LineRule<Summary>] = &[
    LineRule {
        name: "counts",
        apply: counts_line,
    },
    LineRule {
        name: "funding",
        apply: funding_line,
    },
    LineRule {
        name: "vulnerabilities",
        apply: vulnerability_line,
    },
];

fn counts_line(line: &str, acc: &mut Summary) -> bool {
    let Some(re) = COUNT_CLAUSE.as_ref() else {
        return false;
    };
    let mut matched = false;
    for caps in re.captures_iter(line) {
        let n: u32 = caps[2].parse().unwrap_or(0);
        match &caps[1] {
            "added" => acc.added = n,
            "removed" => acc.removed = n,
            "changed" => acc.changed = n,
            _ => acc.audited = n,
        }
        matched = true;
    }
    if matched {
        if let Some(caps) = DURATION_CLAUSE.as_ref().and_then(|re| re.captures(line)) {
            acc.duration_secs = parse_duration_secs(&caps[1]);
        }
    }
    matched
}

fn funding_line(line: &str, acc: &mut Summary) -> bool {
    let Some(caps) = FUNDING.as_ref().and_then(|re| re.captures(line.trim())) else {
        return false;
    };
    acc.funding = caps[1].parse().unwrap_or(0);
    true
}

fn vulnerability_line(line: &str, acc: &mut Summary) -> bool {
    let Some(caps) = VULN_TOTAL.as_ref().and_then(|re| re.captures(line.trim())) else {
        return false;
    };
    let mut vulns = Vulnerabilities {
        total: caps[1].parse().unwrap_or(0),
        ..Vulnerabilities::default()
    };
    if let (Some(breakdown), Some(re)) = (caps.get(2), SEVERITY.as_ref()) {
        for sev in re.captures_iter(breakdown.as_str()) {
            let n: u32 = sev[1].parse().unwrap_or(0);
            match &sev[2] {
                "info" => vulns.info = n,
                "low" => vulns.low = n,
                "moderate" => vulns.moderate = n,
                "high" => vulns.high = n,
                _ => vulns.critical = n,
            }
        }
    }
    acc.vulnerabilities = vulns;
    true
}

fn from_json(raw: &RawInvocation) -> Option<Summary> {
    let doc: InstallDoc = json_object(&raw.stdout)?;
    let recognised = doc.added.is_some() || doc.audited.is_some() || doc.error.is_some();
    if !recognised {
        return None;
    }
    let vulnerabilities = doc
        .vulnerabilities
        .or_else(|| doc.audit.and_then(|a| a.metadata).and_then(|m| m.vulnerabilities))
        .unwrap_or_default()
        .with_total();
    Some(Summary {
        added: doc.added.unwrap_or(0),
        removed: doc.removed.unwrap_or(0),
        changed: doc.changed.unwrap_or(0),
        audited: doc.audited.unwrap_or(0),
        funding: doc.funding.unwrap_or(0),
        vulnerabilities,
        duration_secs: None,
        json_error: doc.error.map(|e| {
            let code = e.code.unwrap_or_default();
            let summary = e.summary.unwrap_or_default();
            format!("{code} {summary}").trim().to_string()
        }),
    })
}

fn from_text(raw: &RawInvocation) -> Summary {
    let mut acc = Summary::default();
    scan_lines(&raw.stdout, LINE_RULES, &mut acc);
    scan_lines(&raw.stderr, LINE_RULES, &mut acc);
    acc.vulnerabilities = acc.vulnerabilities.with_total();
    acc
}

/// Parse `npm install` output.
pub fn parse_install(raw: &RawInvocation) -> NpmInstall {
    let summary = from_json(raw).unwrap_or_else(|| from_text(raw));
    let outcome = match &summary.json_error {
        // `--json` reports failures in the document, sometimes with a zero exit.
        Some(message) if raw.succeeded() => {
            Outcome::failed(NPM_ERRORS.classify(&format!("{message}\n{}", raw.combined())), message.clone())
        }
        _ => Outcome::from_invocation(raw, &NPM_ERRORS),
    };
    NpmInstall {
        outcome,
        added: summary.added,
        removed: summary.removed,
        changed: summary.changed,
        audited: summary.audited,
        funding: summary.funding,
        vulnerabilities: summary.vulnerabilities,
        duration_secs: summary.duration_secs,
    }
}

impl Present for NpmInstall {
    type Compact = NpmInstallCompact;

    fn format_full(&self) -> String {
        let mut out = format!(
            "npm install: {}, added {}, removed {}, changed {}, audited {}\n",
            self.outcome.headline(),
            self.added,
            self.removed,
            self.changed,
            self.audited
        );
        if self.funding > 0 {
            out.push_str(&format!("{} package(s) looking for funding\n", self.funding));
        }
        if self.vulnerabilities.total > 0 {
            out.push_str(&format!(
                "{} vulnerabilities ({})\n",
                self.vulnerabilities.total,
                self.vulnerabilities.breakdown()
            ));
        } else {
            out.push_str("no vulnerabilities\n");
        }
        if let Some(secs) = self.duration_secs {
            out.push_str(&format!("took {}\n", format_secs(secs)));
        }
        out
    }

    fn project_compact(&self) -> NpmInstallCompact {
        NpmInstallCompact {
            outcome: self.outcome.clone(),
            added: self.added,
            removed: self.removed,
            changed: self.changed,
            audited: self.audited,
            vulnerabilities: self.vulnerabilities.total,
            duration_secs: self.duration_secs,
        }
    }

    fn format_compact(compact: &NpmInstallCompact) -> String {
        let took = compact
            .duration_secs
            .map(|s| format!(" in {}", format_secs(s)))
            .unwrap_or_default();
        format!(
            "npm install: {}, +{} -{} ~{}, {} vulnerabilities{took}\n",
            compact.outcome.headline(),
            compact.added,
            compact.removed,
            compact.changed,
            compact.vulnerabilities
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_summary() {
        let stdout = "\
added 12 packages, removed 1 package, changed 2 packages, and audited 300 packages in 3s

42 packages are looking for funding
  run `npm fund` for details

5 vulnerabilities (2 moderate, 3 high)
";
        let result = parse_install(&RawInvocation::new(stdout, "", 0));
        assert!(result.outcome.is_success());
        assert_eq!((result.added, result.removed, result.changed, result.audited), (12, 1, 2, 300));
        assert_eq!(result.funding, 42);
        assert_eq!(result.vulnerabilities.total, 5);
        assert_eq!(result.vulnerabilities.moderate, 2);
        assert_eq!(result.vulnerabilities.high, 3);
        assert_eq!(result.duration_secs, Some(3.0));
    }

    #[test]
    fn test_up_to_date_text() {
        let stdout = "\nup to date, audited 87 packages in 450ms\n\nfound 0 vulnerabilities\n";
        let result = parse_install(&RawInvocation::new(stdout, "", 0));
        assert_eq!(result.added, 0);
        assert_eq!(result.audited, 87);
        assert_eq!(result.duration_secs, Some(0.45));
        assert_eq!(result.vulnerabilities.total, 0);
    }

    #[test]
    fn test_json_summary() {
        let stdout = r#"{
  "added": 3,
  "removed": 0,
  "changed": 0,
  "audited": 4,
  "funding": 1,
  "audit": {"metadata": {"vulnerabilities": {"info": 0, "low": 1, "moderate": 0, "high": 0, "critical": 1, "total": 2}}}
}"#;
        let result = parse_install(&RawInvocation::new(stdout, "", 0));
        assert_eq!(result.added, 3);
        assert_eq!(result.vulnerabilities.total, 2);
        assert_eq!(result.vulnerabilities.critical, 1);
        let compact = result.project_compact();
        assert_eq!(compact.vulnerabilities, 2);
    }

    #[test]
    fn test_json_error_document() {
        let stdout = r#"{"error": {"code": "E404", "summary": "Not Found - GET https://registry.npmjs.org/nope-pkg - Not found"}}"#;
        let result = parse_install(&RawInvocation::new(stdout, "", 1));
        assert_eq!(result.outcome.kind(), Some(NpmErrorKind::PackageNotFound));
    }

    #[test]
    fn test_error_kinds() {
        let cases = [
            (
                "npm ERR! code ERESOLVE\nnpm ERR! ERESOLVE unable to resolve dependency tree\nnpm ERR! Could not resolve dependency:\nnpm ERR! peer react@\"^17\" from x@1.0.0",
                NpmErrorKind::PeerDependencyConflict,
            ),
            (
                "npm ERR! code ENOTFOUND\nnpm ERR! request to https://registry.npmjs.org/x failed, reason: getaddrinfo ENOTFOUND registry.npmjs.org",
                NpmErrorKind::Network,
            ),
            (
                "npm ERR! code EACCES\nnpm ERR! Error: EACCES: permission denied, mkdir '/usr/lib/node_modules/x'",
                NpmErrorKind::PermissionDenied,
            ),
            (
                "npm ERR! code E404\nnpm ERR! 404 Not Found - GET https://registry.npmjs.org/nope - Not found",
                NpmErrorKind::PackageNotFound,
            ),
        ];
        for (stderr, expected) in cases {
            let result = parse_install(&RawInvocation::new("", stderr, 1));
            assert_eq!(result.outcome.kind(), Some(expected), "{stderr}");
        }
    }

    #[test]
    fn test_install_args_guarded() {
        let args = InstallArgs {
            packages: vec!["left-pad".to_string(), "--global".to_string()],
            dev: false,
        };
        assert!(install_args(&args).is_err());
    }
}
