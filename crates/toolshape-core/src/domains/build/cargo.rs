//! `cargo build` output.
//!
//! rustc prints a header line (`error[E0308]: mismatched types`) and the
//! location on a following `-->` line, so a diagnostic stays pending until
//! its location arrives or the next header starts.

use std::sync::LazyLock;

use regex::Regex;

use super::diagnostic::{Diagnostic, Severity, Toolchain};
use super::{assemble, BuildResult, FooterCounts};
use crate::extract::{scan_lines, LineRule};
use crate::raw::RawInvocation;
use crate::units::parse_duration_secs;

static HEADER_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(error|warning)(?:\[([A-Za-z0-9_:]+)\])?: (.+)$").ok());

static LOCATION_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*-->\s+(.+?):(\d+):(\d+)\s*$").ok());

static FINISHED_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*Finished .* in (\S+)\s*$").ok());

static GENERATED_WARNINGS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"generated (\d+) warnings?").ok());

static PREVIOUS_ERRORS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"due to (\d+) previous errors?").ok());

#[derive(Default)]
struct Accumulator {
    diagnostics: Vec<Diagnostic>,
    pending: Option<Diagnostic>,
    footer: FooterCounts,
    finished: Option<f64>,
}

impl Accumulator {
    fn flush(&mut self) {
        if let Some(diag) = self.pending.take() {
            self.diagnostics.push(diag);
        }
    }
}

const LINE_RULES: &[LineRule<Accumulator>] = &[
    LineRule {
        name: "summary",
        apply: summary_line,
    },
    LineRule {
        name: "header",
        apply: header_line,
    },
    LineRule {
        name: "location",
        apply: location_line,
    },
    LineRule {
        name: "finished",
        apply: finished_line,
    },
];

/// Cargo's closing `warning: ... generated N warnings` and
/// `error: could not compile ... due to N previous errors` lines.
fn summary_line(line: &str, acc: &mut Accumulator) -> bool {
    if let Some(caps) = GENERATED_WARNINGS.as_ref().and_then(|re| re.captures(line)) {
        if line.starts_with("warning:") {
            acc.flush();
            let n: usize = caps[1].parse().unwrap_or(0);
            acc.footer.warnings = Some(acc.footer.warnings.unwrap_or(0) + n);
            return true;
        }
    }
    if line.starts_with("error: could not compile") || line.starts_with("error: aborting due to") {
        acc.flush();
        if let Some(caps) = PREVIOUS_ERRORS.as_ref().and_then(|re| re.captures(line)) {
            let n: usize = caps[1].parse().unwrap_or(0);
            acc.footer.errors = Some(acc.footer.errors.unwrap_or(0) + n);
        }
        return true;
    }
    false
}

fn header_line(line: &str, acc: &mut Accumulator) -> bool {
    let Some(caps) = HEADER_LINE.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    acc.flush();
    let severity = if &caps[1] == "error" {
        Severity::Error
    } else {
        Severity::Warning
    };
    let mut diag = Diagnostic::new(severity, caps[3].trim().to_string(), Toolchain::Cargo);
    if let Some(code) = caps.get(2) {
        diag = diag.with_code(code.as_str().to_string());
    }
    acc.pending = Some(diag);
    true
}

fn location_line(line: &str, acc: &mut Accumulator) -> bool {
    let Some(caps) = LOCATION_LINE.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    // Only the primary span counts; secondary `-->` lines of the same diagnostic are ignored.
    if let Some(diag) = acc.pending.take() {
        let line_no = caps[2].parse().unwrap_or(0);
        let column = caps[3].parse().unwrap_or(0);
        acc.diagnostics
            .push(diag.with_location(caps[1].to_string(), line_no, column));
    }
    true
}

fn finished_line(line: &str, acc: &mut Accumulator) -> bool {
    let Some(caps) = FINISHED_LINE.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    acc.flush();
    acc.finished = parse_duration_secs(&caps[1]);
    true
}

/// Parse `cargo build` output. Cargo writes everything to stderr.
pub fn parse_cargo_build(raw: &RawInvocation) -> BuildResult {
    let mut acc = Accumulator::default();
    scan_lines(&raw.stderr, LINE_RULES, &mut acc);
    scan_lines(&raw.stdout, LINE_RULES, &mut acc);
    acc.flush();
    assemble(raw, Toolchain::Cargo, acc.diagnostics, acc.footer, acc.finished)
}
