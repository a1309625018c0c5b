//! Integration tests for the tokio process runner and the guard-first call order.

use toolshape_core::domains::docker::args::run_args;
use toolshape_core::domains::docker::{parse_run, RunArgs};
use toolshape_core::raw::TIMEOUT_EXIT_CODE;
use toolshape_core::RawInvocation;
use toolshape_runner::{InvokeOptions, ProcessRunner, RunnerConfig, RunnerError, StaticRunner, TokioRunner};

fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

#[cfg(unix)]
#[tokio::test]
async fn test_timeout_kills_child_and_keeps_partial_output() {
    let runner = TokioRunner::default();
    let options = InvokeOptions {
        timeout_ms: Some(300),
        ..Default::default()
    };

    let started = std::time::Instant::now();
    let raw = runner
        .invoke("sh", &sh("echo started; sleep 10; echo never"), options)
        .await
        .expect("invoke failed");

    assert!(raw.timed_out);
    assert_eq!(raw.exit_code, TIMEOUT_EXIT_CODE);
    assert!(raw.stdout.contains("started"));
    assert!(!raw.stdout.contains("never"));
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_zero_exit_is_not_an_error() {
    let runner = TokioRunner::default();
    let raw = runner
        .invoke("sh", &sh("echo oops >&2; exit 3"), InvokeOptions::default())
        .await
        .expect("invoke failed");

    assert_eq!(raw.exit_code, 3);
    assert_eq!(raw.stderr.trim(), "oops");
    assert!(!raw.timed_out);
}

#[tokio::test]
async fn test_missing_executable_is_not_found() {
    let runner = TokioRunner::default();
    let err = runner
        .invoke("toolshape-definitely-missing-binary", &[], InvokeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RunnerError::NotFound { ref command } if command == "toolshape-definitely-missing-binary"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_output_is_truncated_at_limit() {
    let runner = TokioRunner::new(RunnerConfig {
        max_output_bytes: 16,
        ..Default::default()
    });
    let raw = runner
        .invoke("sh", &sh("head -c 5000 /dev/zero | tr '\\0' 'a'"), InvokeOptions::default())
        .await
        .expect("invoke failed");

    assert!(raw.succeeded());
    assert_eq!(raw.stdout, "a".repeat(16));
}

#[cfg(unix)]
#[tokio::test]
async fn test_stdin_and_cwd_are_passed_through() {
    let runner = TokioRunner::default();
    let raw = runner
        .invoke(
            "cat",
            &[],
            InvokeOptions {
                stdin: Some("piped input".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("invoke failed");
    assert_eq!(raw.stdout, "piped input");

    let dir = std::env::temp_dir().canonicalize().expect("temp dir");
    let raw = runner
        .invoke(
            "pwd",
            &[],
            InvokeOptions {
                cwd: Some(dir.clone()),
                ..Default::default()
            },
        )
        .await
        .expect("invoke failed");
    assert_eq!(raw.stdout.trim(), dir.to_string_lossy());
}

// -------------------------------------------------------------------------
// Guard before runner
// -------------------------------------------------------------------------

async fn docker_run(runner: &dyn ProcessRunner, args: &RunArgs) -> Option<RawInvocation> {
    let argv = run_args(args).ok()?;
    runner.invoke("docker", &argv, InvokeOptions::default()).await.ok()
}

#[tokio::test]
async fn test_guard_rejection_spawns_nothing() {
    let runner = StaticRunner::new(RawInvocation::new("", "", 0));
    let args = RunArgs {
        image: "alpine".into(),
        volumes: vec!["/etc:/host-etc".into()],
        ..Default::default()
    };

    assert!(docker_run(&runner, &args).await.is_none());
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn test_accepted_arguments_reach_the_runner_and_parse() {
    let id = "4f9b2c1d0e8a7b6c5d4e3f2a1b0c9d8e7f6a5b4c3d2e1f0a9b8c7d6e5f4a3b2c";
    let runner = StaticRunner::new(RawInvocation::new(format!("{id}\n"), "", 0));
    let args = RunArgs {
        image: "nginx".into(),
        name: Some("web".into()),
        ports: vec!["8080:80".into()],
        ..Default::default()
    };

    let raw = docker_run(&runner, &args).await.expect("runner called");
    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].command, "docker");
    assert_eq!(calls[0].args.first().map(String::as_str), Some("run"));

    let result = parse_run(&raw, "nginx", Some("web"));
    assert!(result.outcome.is_success());
    assert_eq!(result.id.as_deref(), Some("4f9b2c1d0e8a"));
}
