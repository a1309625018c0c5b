//! toolshape runner
//!
//! Spawns wrapped CLIs and hands their captured output to the parsers as a
//! [`RawInvocation`](toolshape_core::RawInvocation). Timeouts are enforced
//! here and reported through `timed_out` plus exit code 124; the parsers fold
//! them into an ordinary failed result.

pub mod config;
pub mod error;
pub mod runner;

pub use config::RunnerConfig;
pub use error::{RunnerError, RunnerResult};
pub use runner::{InvokeOptions, ProcessRunner, RecordedCall, StaticRunner, TokioRunner};
