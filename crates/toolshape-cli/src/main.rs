//! toolshape - structured output for everyday CLI tools
//!
//! The `toolshape` command runs a wrapped tool (docker, git, kubectl, npm,
//! dotnet, cargo, helm, gh, curl) and prints a normalized result instead of
//! the tool's own output.
//!
//! ## Commands
//!
//! - `docker`, `git`, `kubectl`, `npm`, `dotnet`, `cargo`, `helm`, `gh`, `http`:
//!   guard the arguments, run the tool, parse and present its output
//! - `parse`: normalize output captured earlier, without running anything
//!
//! ## Exit status
//!
//! `0` whenever a result was produced, including results with
//! `success = false`; `2` when an argument was rejected; `1` when the tool
//! could not be run.

mod cli;
mod plan;
mod target;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};

use toolshape_core::{GuardError, PresentOptions, RawInvocation};
use toolshape_runner::{InvokeOptions, ProcessRunner, RunnerConfig, TokioRunner};

use crate::cli::{Cli, Commands, OutputFormat, ParseOpts, ToolCommand};
use crate::target::{Rendered, RequestContext};

const EXIT_GUARD_REJECTED: u8 = 2;
const EXIT_RUNNER_FAILED: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    toolshape_core::telemetry::init_tracing(cli.json_logs, level);

    let options = PresentOptions { force_full: cli.full };
    let config = RunnerConfig {
        timeout_ms: cli.timeout_ms,
        cwd: cli.cwd.clone(),
        ..Default::default()
    };

    let rendered = match cli.command {
        Commands::Parse(opts) => cmd_parse(&opts, options),
        Commands::Tool(tool) => cmd_run(&TokioRunner::new(config), tool, options).await,
    };

    match rendered.and_then(|rendered| emit(&rendered, cli.format)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if err.downcast_ref::<GuardError>().is_some() {
                ExitCode::from(EXIT_GUARD_REJECTED)
            } else {
                ExitCode::from(EXIT_RUNNER_FAILED)
            }
        }
    }
}

/// Guard, run, parse, present.
async fn cmd_run(runner: &dyn ProcessRunner, tool: ToolCommand, options: PresentOptions) -> Result<Rendered> {
    let plan = plan::plan(tool).inspect_err(|err| warn!(error = %err, "argument rejected"))?;

    let raw = runner
        .invoke(plan.program, &plan.argv, InvokeOptions::default())
        .await
        .with_context(|| format!("failed to run {}", plan.program))?;

    info!(target_action = ?plan.target, exit_code = raw.exit_code, timed_out = raw.timed_out, "parsing output");
    plan.target.render(&raw, &plan.context, options)
}

/// Normalize captured output files.
fn cmd_parse(opts: &ParseOpts, options: PresentOptions) -> Result<Rendered> {
    let stdout = read_capture(&opts.stdout)?;
    let stderr = match &opts.stderr {
        Some(path) => read_capture(path)?,
        None => String::new(),
    };

    let mut raw = RawInvocation::new(stdout, stderr, opts.exit_code);
    raw.timed_out = opts.timed_out;

    let context = RequestContext {
        image: opts.image.clone(),
        name: opts.name.clone(),
        project: opts.project.clone(),
        remote: opts.remote.clone(),
        branch: opts.branch.clone(),
        resource: opts.resource.clone(),
        namespace: opts.namespace.clone(),
        release: opts.release.clone(),
    };
    opts.target.render(&raw, &context, options)
}

fn read_capture(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn emit(rendered: &Rendered, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", ensure_newline(&rendered.text)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(rendered).context("failed to serialize output")?
        ),
    }
    Ok(())
}

fn ensure_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use toolshape_runner::StaticRunner;

    use crate::target::Target;

    fn capture(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn parse_opts(target: Target, stdout: &Path) -> ParseOpts {
        ParseOpts {
            target,
            stdout: stdout.to_path_buf(),
            stderr: None,
            exit_code: 0,
            timed_out: false,
            image: None,
            name: None,
            project: None,
            remote: None,
            branch: None,
            resource: None,
            namespace: None,
            release: None,
        }
    }

    fn tool(argv: &[&str]) -> ToolCommand {
        let mut full = vec!["toolshape"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Tool(tool) => tool,
            Commands::Parse(_) => panic!("expected a tool command"),
        }
    }

    #[test]
    fn test_parse_git_status_capture() {
        let stdout = capture("## main...origin/main [ahead 1]\nM  src/lib.rs\n?? notes.md\n");
        let rendered = cmd_parse(
            &parse_opts(Target::GitStatus, stdout.path()),
            PresentOptions { force_full: true },
        )
        .unwrap();

        assert_eq!(rendered.structured["success"], true);
        assert_eq!(rendered.structured["branch"], "main");
        assert_eq!(rendered.structured["ahead"], 1);
    }

    #[test]
    fn test_parse_failed_capture_is_still_a_result() {
        let stdout = capture("");
        let stderr = capture("fatal: not a git repository (or any of the parent directories): .git\n");
        let mut opts = parse_opts(Target::GitStatus, stdout.path());
        opts.stderr = Some(stderr.path().to_path_buf());
        opts.exit_code = 128;

        let rendered = cmd_parse(&opts, PresentOptions::default()).unwrap();
        assert_eq!(rendered.structured["success"], false);
        assert_eq!(rendered.structured["errorType"], "not-a-repository");
    }

    #[test]
    fn test_parse_timed_out_capture() {
        let stdout = capture("partial");
        let mut opts = parse_opts(Target::NpmInstall, stdout.path());
        opts.timed_out = true;

        let rendered = cmd_parse(&opts, PresentOptions { force_full: true }).unwrap();
        assert_eq!(rendered.structured["success"], false);
        let message = rendered.structured["errorMessage"].as_str().unwrap_or_default();
        assert!(message.starts_with("timed out"));
    }

    #[test]
    fn test_parse_missing_file_is_an_error() {
        let opts = parse_opts(Target::GitLog, Path::new("/nonexistent/toolshape/stdout.txt"));
        assert!(cmd_parse(&opts, PresentOptions::default()).is_err());
    }

    #[tokio::test]
    async fn test_guard_rejection_never_reaches_runner() {
        let runner = StaticRunner::new(RawInvocation::new("", "", 0));
        let err = cmd_run(&runner, tool(&["docker", "pull", "--", "--all-tags"]), PresentOptions::default())
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<GuardError>().is_some());
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_parses_runner_output() {
        let runner = StaticRunner::new(RawInvocation::new("", "Error: INSTALLATION FAILED: cannot re-use a name that is still in use\n", 1));
        let rendered = cmd_run(
            &runner,
            tool(&["helm", "install", "web", "bitnami/nginx"]),
            PresentOptions { force_full: true },
        )
        .await
        .unwrap();

        assert_eq!(runner.calls()[0].command, "helm");
        assert_eq!(rendered.structured["success"], false);
        assert_eq!(rendered.structured["errorType"], "already-exists");
    }

    #[test]
    fn test_ensure_newline() {
        assert_eq!(ensure_newline("a"), "a\n");
        assert_eq!(ensure_newline("a\n"), "a\n");
    }
}
