//! Build diagnostics for `dotnet build` and `cargo build`.
//!
//! # Modules
//!
//! - [`diagnostic`]: shared `Diagnostic` and `Severity` types
//! - [`dotnet`]: MSBuild line grammar and footer
//! - [`cargo`]: rustc header plus `-->` location grammar
//!
//! Both toolchains produce the same [`BuildResult`]. Counts always come from
//! the itemized diagnostics; a tool's own summary counts are only used when
//! nothing itemized was found.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::guard::{assert_no_flag_injection, GuardResult};
use crate::outcome::Outcome;
use crate::present::{cap_map, more_line, Present, COMPACT_LIST_LIMIT};
use crate::raw::RawInvocation;
use crate::units::format_secs;

pub mod cargo;
pub mod diagnostic;
pub mod dotnet;

pub use cargo::parse_cargo_build;
pub use diagnostic::{dedupe, Diagnostic, Severity, Toolchain};
pub use dotnet::parse_dotnet_build;

crate::error_kinds! {
    pub enum BuildErrorKind {
        CompilationFailed => "compilation-failed",
        RestoreFailed => "restore-failed",
        ProjectNotFound => "project-not-found",
        Unknown => "unknown",
    }
}

/// Missing-project errors are checked first since MSBuild prints them with
/// an `error` prefix that would otherwise read as a compile failure.
pub static BUILD_ERRORS: LazyLock<Classifier<BuildErrorKind>> = LazyLock::new(|| {
    Classifier::new()
        .pattern(
            r"\bMSB1009\b|\bMSB1003\b|project file does not exist|could not find `cargo\.toml`|manifest path `[^`]*` does not exist",
            BuildErrorKind::ProjectNotFound,
        )
        .pattern(
            r"\bNU1\d{3}\b|restore failed|failed to select a version|no matching package named|failed to download|failed to get `[^`]+` as a dependency",
            BuildErrorKind::RestoreFailed,
        )
        .pattern(
            r"error CS\d+|error\[E\d+\]|could not compile|aborting due to|build failed",
            BuildErrorKind::CompilationFailed,
        )
});

/// Caller parameters for a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildArgs {
    /// Project/solution file for dotnet, manifest path for cargo.
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub configuration: Option<String>,
    #[serde(default)]
    pub release: bool,
}

/// `dotnet build [project] [--configuration C] --nologo`
pub fn dotnet_build_args(args: &BuildArgs) -> GuardResult<Vec<String>> {
    let mut argv = vec!["build".to_string()];
    if let Some(project) = &args.project {
        assert_no_flag_injection(project, "project")?;
        argv.push(project.clone());
    }
    let configuration = match (&args.configuration, args.release) {
        (Some(c), _) => Some(c.clone()),
        (None, true) => Some("Release".to_string()),
        (None, false) => None,
    };
    if let Some(configuration) = configuration {
        assert_no_flag_injection(&configuration, "configuration")?;
        argv.push("--configuration".to_string());
        argv.push(configuration);
    }
    argv.push("--nologo".to_string());
    Ok(argv)
}

/// `cargo build [--manifest-path P] [--release] --color never`
pub fn cargo_build_args(args: &BuildArgs) -> GuardResult<Vec<String>> {
    let mut argv = vec!["build".to_string()];
    if let Some(project) = &args.project {
        assert_no_flag_injection(project, "project")?;
        argv.push("--manifest-path".to_string());
        argv.push(project.clone());
    }
    if args.release {
        argv.push("--release".to_string());
    }
    argv.push("--color".to_string());
    argv.push("never".to_string());
    Ok(argv)
}

/// Result of a build.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    #[serde(flatten)]
    pub outcome: Outcome<BuildErrorKind>,
    pub toolchain: Toolchain,
    pub diagnostics: Vec<Diagnostic>,
    pub errors: usize,
    pub warnings: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCompact {
    #[serde(flatten)]
    pub outcome: Outcome<BuildErrorKind>,
    pub toolchain: Toolchain,
    pub errors: usize,
    pub warnings: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Up to ten diagnostics, errors before warnings.
    pub diagnostics: Vec<DiagnosticSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSummary {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub message: String,
}

/// Counts printed by the tool itself, trusted only without itemized records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FooterCounts {
    pub errors: Option<usize>,
    pub warnings: Option<usize>,
}

/// Assemble a [`BuildResult`] from the pieces every toolchain grammar produces.
pub(crate) fn assemble(
    raw: &RawInvocation,
    toolchain: Toolchain,
    diagnostics: Vec<Diagnostic>,
    footer: FooterCounts,
    duration_secs: Option<f64>,
) -> BuildResult {
    let diagnostics = dedupe(diagnostics);
    let (errors, warnings) = if diagnostics.is_empty() {
        (footer.errors.unwrap_or(0), footer.warnings.unwrap_or(0))
    } else {
        (
            diagnostics.iter().filter(|d| d.severity == Severity::Error).count(),
            diagnostics.iter().filter(|d| d.severity == Severity::Warning).count(),
        )
    };

    let outcome = if raw.succeeded() && errors > 0 {
        Outcome::failed(
            BUILD_ERRORS.classify(&raw.combined()),
            format!("{errors} error(s) reported"),
        )
    } else {
        Outcome::from_invocation(raw, &BUILD_ERRORS)
    };

    BuildResult {
        outcome,
        toolchain,
        total: if diagnostics.is_empty() { errors + warnings } else { diagnostics.len() },
        diagnostics,
        errors,
        warnings,
        duration_secs,
    }
}

impl Present for BuildResult {
    type Compact = BuildCompact;

    fn format_full(&self) -> String {
        let tool = match self.toolchain {
            Toolchain::Dotnet => "dotnet build",
            Toolchain::Cargo => "cargo build",
        };
        let mut out = format!(
            "{tool}: {}, {} error(s), {} warning(s)",
            self.outcome.headline(),
            self.errors,
            self.warnings
        );
        if let Some(secs) = self.duration_secs {
            out.push_str(&format!(" in {}", format_secs(secs)));
        }
        out.push('\n');
        for d in &self.diagnostics {
            let location = d.location().map(|l| format!("{l}: ")).unwrap_or_default();
            let code = d.code.as_deref().map(|c| format!(" {c}")).unwrap_or_default();
            out.push_str(&format!("{location}{}{code}: {}\n", d.severity.as_str(), d.message));
            if let Some(project) = &d.project {
                out.push_str(&format!("  in {project}\n"));
            }
        }
        out
    }

    fn project_compact(&self) -> BuildCompact {
        let mut ordered: Vec<&Diagnostic> = self.diagnostics.iter().collect();
        // Stable, so file order is kept within a severity.
        ordered.sort_by(|a, b| b.severity.cmp(&a.severity));
        BuildCompact {
            outcome: self.outcome.clone(),
            toolchain: self.toolchain,
            errors: self.errors,
            warnings: self.warnings,
            total: self.total,
            duration_secs: self.duration_secs,
            diagnostics: cap_map(&ordered, COMPACT_LIST_LIMIT, |d| DiagnosticSummary {
                severity: d.severity,
                code: d.code.clone(),
                location: d.location(),
                message: d.message.clone(),
            }),
        }
    }

    fn format_compact(compact: &BuildCompact) -> String {
        let mut out = format!(
            "build: {}, {} error(s), {} warning(s)\n",
            compact.outcome.headline(),
            compact.errors,
            compact.warnings
        );
        for d in &compact.diagnostics {
            out.push_str(&format!(
                "{} {}{}: {}\n",
                d.severity.as_str(),
                d.location.as_deref().unwrap_or("-"),
                d.code.as_deref().map(|c| format!(" {c}")).unwrap_or_default(),
                d.message
            ));
        }
        if let Some(more) = more_line(compact.total, compact.diagnostics.len()) {
            out.push_str(&more);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_priorities() {
        assert_eq!(
            BUILD_ERRORS.classify("MSBUILD : error MSB1009: Project file does not exist."),
            BuildErrorKind::ProjectNotFound
        );
        assert_eq!(
            BUILD_ERRORS.classify("/src/App.csproj : error NU1101: Unable to find package Nope."),
            BuildErrorKind::RestoreFailed
        );
        assert_eq!(
            BUILD_ERRORS.classify("error: could not compile `app` (bin \"app\") due to 1 previous error"),
            BuildErrorKind::CompilationFailed
        );
        assert_eq!(
            BUILD_ERRORS.classify("error: could not find `Cargo.toml` in `/tmp` or any parent directory"),
            BuildErrorKind::ProjectNotFound
        );
    }

    #[test]
    fn test_args() {
        let args = BuildArgs {
            project: Some("App.sln".to_string()),
            configuration: None,
            release: true,
        };
        assert_eq!(
            dotnet_build_args(&args).unwrap(),
            ["build", "App.sln", "--configuration", "Release", "--nologo"]
        );
        assert_eq!(
            cargo_build_args(&args).unwrap(),
            ["build", "--manifest-path", "App.sln", "--release", "--color", "never"]
        );
        let args = BuildArgs {
            project: Some("-p:Evil=1".to_string()),
            ..BuildArgs::default()
        };
        assert!(dotnet_build_args(&args).is_err());
    }

    #[test]
    fn test_footer_only_without_items() {
        let raw = RawInvocation::new("", "", 1);
        let footer = FooterCounts {
            errors: Some(2),
            warnings: Some(3),
        };
        let result = assemble(&raw, Toolchain::Dotnet, Vec::new(), footer, None);
        assert_eq!((result.errors, result.warnings, result.total), (2, 3, 5));

        let diag = Diagnostic::new(Severity::Error, "boom".to_string(), Toolchain::Dotnet);
        let result = assemble(&raw, Toolchain::Dotnet, vec![diag], footer, None);
        assert_eq!((result.errors, result.warnings, result.total), (1, 0, 1));
    }

    #[test]
    fn test_compact_puts_errors_first() {
        let raw = RawInvocation::new("", "", 1);
        let diags = vec![
            Diagnostic::new(Severity::Warning, "w1".to_string(), Toolchain::Cargo),
            Diagnostic::new(Severity::Error, "e1".to_string(), Toolchain::Cargo),
            Diagnostic::new(Severity::Warning, "w2".to_string(), Toolchain::Cargo),
        ];
        let result = assemble(&raw, Toolchain::Cargo, diags, FooterCounts::default(), None);
        let messages: Vec<_> = result
            .project_compact()
            .diagnostics
            .into_iter()
            .map(|d| d.message)
            .collect();
        assert_eq!(messages, vec!["e1", "w1", "w2"]);
    }
}
