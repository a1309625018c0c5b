//! Process execution.
//!
//! [`ProcessRunner`] is the seam between the pure parsing core and the
//! operating system. [`TokioRunner`] spawns real processes; [`StaticRunner`]
//! replays a canned result and records what it was asked to run.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use toolshape_core::raw::TIMEOUT_EXIT_CODE;
use toolshape_core::RawInvocation;

use crate::config::RunnerConfig;
use crate::error::{RunnerError, RunnerResult};

/// How long to keep draining pipes after the child has been killed.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 8 * 1024;

/// Per-call overrides of [`RunnerConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeOptions {
    pub cwd: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    /// Written to the child's stdin, which is then closed.
    pub stdin: Option<String>,
}

/// Anything that can run a command and capture its output.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` with `args` and capture stdout, stderr and the exit code.
    ///
    /// Only failures to start or wait on the process are errors. A timeout
    /// returns `Ok` with `timed_out` set.
    async fn invoke(
        &self,
        command: &str,
        args: &[String],
        options: InvokeOptions,
    ) -> RunnerResult<RawInvocation>;
}

// ---------------------------------------------------------------------------
// Tokio runner
// ---------------------------------------------------------------------------

/// Runs commands as tokio child processes.
#[derive(Debug, Clone, Default)]
pub struct TokioRunner {
    config: RunnerConfig,
}

impl TokioRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }
}

#[async_trait]
impl ProcessRunner for TokioRunner {
    async fn invoke(
        &self,
        command: &str,
        args: &[String],
        options: InvokeOptions,
    ) -> RunnerResult<RawInvocation> {
        let start = Instant::now();
        let timeout = Duration::from_millis(options.timeout_ms.unwrap_or(self.config.timeout_ms));
        let limit = self.config.max_output_bytes;

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(if options.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = options.cwd.as_ref().or(self.config.cwd.as_ref()) {
            cmd.current_dir(cwd);
        }

        info!(command, args = ?args, timeout_ms = timeout.as_millis() as u64, "invoking");
        let mut child = cmd.spawn().map_err(|err| RunnerError::spawn(command, err))?;

        if let (Some(input), Some(mut pipe)) = (options.stdin, child.stdin.take()) {
            tokio::spawn(async move {
                // A child that exits without reading stdin closes the pipe early.
                if let Err(err) = pipe.write_all(input.as_bytes()).await {
                    debug!(error = %err, "stdin write ended early");
                }
            });
        }

        let stdout = Capture::shared(limit);
        let stderr = Capture::shared(limit);
        let stdout_task = child.stdout.take().map(|pipe| tokio::spawn(drain(pipe, stdout.clone())));
        let stderr_task = child.stderr.take().map(|pipe| tokio::spawn(drain(pipe, stderr.clone())));

        let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => (status.code().unwrap_or(-1), false),
            Ok(Err(source)) => {
                return Err(RunnerError::Wait {
                    command: command.to_string(),
                    source,
                })
            }
            Err(_) => {
                warn!(command, timeout_ms = timeout.as_millis() as u64, "timed out, killing");
                if let Err(err) = child.kill().await {
                    debug!(error = %err, "kill after timeout failed");
                }
                (TIMEOUT_EXIT_CODE, true)
            }
        };

        // Grandchildren can keep a pipe open after the child is gone.
        for task in [stdout_task, stderr_task].into_iter().flatten() {
            let abort = task.abort_handle();
            if tokio::time::timeout(DRAIN_GRACE, task).await.is_err() {
                abort.abort();
            }
        }

        let raw = RawInvocation {
            stdout: Capture::finish(&stdout, "stdout"),
            stderr: Capture::finish(&stderr, "stderr"),
            exit_code,
            timed_out,
        };
        debug!(
            command,
            exit_code,
            timed_out,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "invocation finished"
        );
        Ok(raw)
    }
}

/// Bytes read from one stream, capped at `limit`.
#[derive(Debug, Default)]
struct Capture {
    bytes: Vec<u8>,
    limit: usize,
    dropped: usize,
}

impl Capture {
    fn shared(limit: usize) -> Arc<Mutex<Capture>> {
        Arc::new(Mutex::new(Capture {
            limit,
            ..Default::default()
        }))
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        let kept = room.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..kept]);
        self.dropped += chunk.len() - kept;
    }

    fn finish(shared: &Arc<Mutex<Capture>>, stream: &str) -> String {
        let capture = lock(shared);
        if capture.dropped > 0 {
            warn!(stream, kept = capture.bytes.len(), dropped = capture.dropped, "output truncated");
        }
        String::from_utf8_lossy(&capture.bytes).into_owned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read `pipe` to EOF, keeping what fits in `sink`.
async fn drain<R: AsyncRead + Unpin>(mut pipe: R, sink: Arc<Mutex<Capture>>) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                lock(&sink).push(&buf[..n]);
            }
            Err(err) => {
                debug!(error = %err, "pipe read failed");
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Static runner
// ---------------------------------------------------------------------------

/// One call received by a [`StaticRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub command: String,
    pub args: Vec<String>,
    pub options: InvokeOptions,
}

/// Returns the same [`RawInvocation`] for every call and remembers the calls.
#[derive(Debug, Default)]
pub struct StaticRunner {
    response: RawInvocation,
    calls: Mutex<Vec<RecordedCall>>,
}

impl StaticRunner {
    pub fn new(response: RawInvocation) -> Self {
        Self {
            response,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl ProcessRunner for StaticRunner {
    async fn invoke(
        &self,
        command: &str,
        args: &[String],
        options: InvokeOptions,
    ) -> RunnerResult<RawInvocation> {
        lock(&self.calls).push(RecordedCall {
            command: command.to_string(),
            args: args.to_vec(),
            options,
        });
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_keeps_prefix_and_counts_dropped() {
        let mut capture = Capture {
            limit: 4,
            ..Default::default()
        };
        capture.push(b"abc");
        capture.push(b"defg");
        assert_eq!(capture.bytes, b"abcd");
        assert_eq!(capture.dropped, 3);
    }

    #[tokio::test]
    async fn test_static_runner_records_calls() {
        let runner = StaticRunner::new(RawInvocation::new("out", "", 0));
        let raw = runner
            .invoke("git", &["status".to_string()], InvokeOptions::default())
            .await
            .unwrap();
        assert_eq!(raw.stdout, "out");
        assert_eq!(runner.call_count(), 1);
        assert_eq!(runner.calls()[0].command, "git");
        assert_eq!(runner.calls()[0].args, vec!["status".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_simple_command() {
        let runner = TokioRunner::default();
        let raw = runner
            .invoke("echo", &["hello".to_string()], InvokeOptions::default())
            .await
            .unwrap();
        assert!(raw.succeeded());
        assert_eq!(raw.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_failing_command() {
        let runner = TokioRunner::default();
        let raw = runner.invoke("false", &[], InvokeOptions::default()).await.unwrap();
        assert!(!raw.succeeded());
        assert_ne!(raw.exit_code, 0);
        assert!(!raw.timed_out);
    }
}
