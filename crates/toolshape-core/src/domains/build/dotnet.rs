//! `dotnet build` (MSBuild) output.
//!
//! MSBuild prints each diagnostic when it occurs and again in the summary
//! after `Build FAILED.`; the repeats are removed by de-duplication.

use std::sync::LazyLock;

use regex::Regex;

use super::diagnostic::{Diagnostic, Severity, Toolchain};
use super::{assemble, BuildResult, FooterCounts};
use crate::extract::{scan_lines, LineRule};
use crate::raw::RawInvocation;
use crate::units::parse_duration_secs;

/// `path(line,col): error CODE: message [project]`, also accepting a bare
/// origin such as `CSC` or `MSBUILD` without a position.
static DIAGNOSTIC_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(.+?)(?:\((\d+)(?:,(\d+))?(?:,\d+,\d+)?\))?\s*:\s*(error|warning|info|message)\s+([A-Za-z]+\d+)?\s*:\s*(.*?)(?:\s+\[([^\]]+)\])?\s*$",
    )
    .ok()
});

static FOOTER_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+(Warning|Error)\(s\)\s*$").ok());

static ELAPSED_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*Time Elapsed\s+(\S+)").ok());

#[derive(Default)]
struct Accumulator {
    diagnostics: Vec<Diagnostic>,
    footer: FooterCounts,
    elapsed: Option<f64>,
}

const LINE_RULES: &[LineRule<Accumulator>] = &[
    LineRule {
        name: "footer",
        apply: footer_line,
    },
    LineRule {
        name: "elapsed",
        apply: elapsed_line,
    },
    LineRule {
        name: "diagnostic",
        apply: diagnostic_line,
    },
];

fn footer_line(line: &str, acc: &mut Accumulator) -> bool {
    let Some(caps) = FOOTER_LINE.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    let n = caps[1].parse().ok();
    if &caps[2] == "Error" {
        acc.footer.errors = n;
    } else {
        acc.footer.warnings = n;
    }
    true
}

fn elapsed_line(line: &str, acc: &mut Accumulator) -> bool {
    let Some(caps) = ELAPSED_LINE.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    acc.elapsed = parse_duration_secs(&caps[1]);
    true
}

fn diagnostic_line(line: &str, acc: &mut Accumulator) -> bool {
    let Some(caps) = DIAGNOSTIC_LINE.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    let severity = match &caps[4] {
        "error" => Severity::Error,
        "warning" => Severity::Warning,
        _ => Severity::Hint,
    };
    let mut diag = Diagnostic::new(severity, caps[6].trim().to_string(), Toolchain::Dotnet);
    if let Some(code) = caps.get(5) {
        diag = diag.with_code(code.as_str().to_string());
    }

    let origin = caps[1].trim().to_string();
    match caps.get(2).and_then(|l| l.as_str().parse::<u32>().ok()) {
        Some(line_no) => {
            let column = caps.get(3).and_then(|c| c.as_str().parse().ok()).unwrap_or(0);
            diag = diag.with_location(origin, line_no, column);
            if column == 0 {
                diag.column = None;
            }
        }
        // Tool names such as `CSC` or `MSBUILD` are not files.
        None if origin.contains(['/', '\\', '.']) => diag.file = Some(origin),
        None => {}
    }
    if let Some(project) = caps.get(7) {
        diag = diag.with_project(project.as_str().to_string());
    }
    acc.diagnostics.push(diag);
    true
}

/// Parse `dotnet build` output.
pub fn parse_dotnet_build(raw: &RawInvocation) -> BuildResult {
    let mut acc = Accumulator::default();
    scan_lines(&raw.stdout, LINE_RULES, &mut acc);
    scan_lines(&raw.stderr, LINE_RULES, &mut acc);
    assemble(raw, Toolchain::Dotnet, acc.diagnostics, acc.footer, acc.elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::build::BuildErrorKind;
    use crate::present::Present;

    const FAILED: &str = "\
  Determining projects to restore...
  All projects are up-to-date for restore.
/src/App/Program.cs(10,5): error CS0103: The name 'x' does not exist in the current context [/src/App/App.csproj]
/src/App/Util.cs(3,13): warning CS0168: The variable 'e' is declared but never used [/src/App/App.csproj]

Build FAILED.

/src/App/Program.cs(10,5): error CS0103: The name 'x' does not exist in the current context [/src/App/App.csproj]
/src/App/Util.cs(3,13): warning CS0168: The variable 'e' is declared but never used [/src/App/App.csproj]
    1 Warning(s)
    1 Error(s)

Time Elapsed 00:00:03.21
";

    #[test]
    fn test_one_error_one_warning() {
        let result = parse_dotnet_build(&RawInvocation::new(FAILED, "", 1));
        assert_eq!(result.errors, 1);
        assert_eq!(result.warnings, 1);
        assert_eq!(result.total, 2);
        assert_eq!(result.diagnostics[0].file.as_deref(), Some("/src/App/Program.cs"));
        assert_eq!(result.diagnostics[1].file.as_deref(), Some("/src/App/Util.cs"));
        assert_eq!(result.outcome.kind(), Some(BuildErrorKind::CompilationFailed));
    }

    #[test]
    fn test_fields() {
        let result = parse_dotnet_build(&RawInvocation::new(FAILED, "", 1));
        let err = &result.diagnostics[0];
        assert_eq!(err.severity, Severity::Error);
        assert_eq!(err.code.as_deref(), Some("CS0103"));
        assert_eq!((err.line, err.column), (Some(10), Some(5)));
        assert_eq!(err.message, "The name 'x' does not exist in the current context");
        assert_eq!(err.project.as_deref(), Some("/src/App/App.csproj"));
        assert!((result.duration_secs.unwrap() - 3.21).abs() < 1e-9);
    }

    #[test]
    fn test_footer_fallback_when_not_itemized() {
        let stdout = "Build succeeded.\n    3 Warning(s)\n    0 Error(s)\n\nTime Elapsed 00:01:02.50\n";
        let result = parse_dotnet_build(&RawInvocation::new(stdout, "", 0));
        assert!(result.outcome.is_success());
        assert!(result.diagnostics.is_empty());
        assert_eq!((result.errors, result.warnings, result.total), (0, 3, 3));
        assert_eq!(result.duration_secs, Some(62.5));
    }

    #[test]
    fn test_origin_without_position() {
        let stdout = "CSC : error CS5001: Program does not contain a static 'Main' method suitable for an entry point [/src/App/App.csproj]\n";
        let result = parse_dotnet_build(&RawInvocation::new(stdout, "", 1));
        assert_eq!(result.errors, 1);
        assert!(result.diagnostics[0].file.is_none());
        assert_eq!(result.diagnostics[0].code.as_deref(), Some("CS5001"));
    }

    #[test]
    fn test_missing_project() {
        let stdout = "MSBUILD : error MSB1009: Project file does not exist.\nSwitch: Nope.csproj\n";
        let result = parse_dotnet_build(&RawInvocation::new(stdout, "", 1));
        assert_eq!(result.outcome.kind(), Some(BuildErrorKind::ProjectNotFound));
    }

    #[test]
    fn test_restore_failure() {
        let stdout = "/src/App/App.csproj : error NU1101: Unable to find package Nope.Package. No packages exist with this id in source(s): nuget.org\n";
        let result = parse_dotnet_build(&RawInvocation::new(stdout, "", 1));
        assert_eq!(result.outcome.kind(), Some(BuildErrorKind::RestoreFailed));
        assert_eq!(result.diagnostics[0].file.as_deref(), Some("/src/App/App.csproj"));
    }

    #[test]
    fn test_compact_text_is_stable() {
        let result = parse_dotnet_build(&RawInvocation::new(FAILED, "", 1));
        let compact = result.project_compact();
        let first = BuildResult::format_compact(&compact);
        assert_eq!(first, BuildResult::format_compact(&compact));
        assert!(first.contains("error /src/App/Program.cs:10:5 CS0103"));
    }
}
