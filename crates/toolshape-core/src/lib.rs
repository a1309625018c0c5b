//! toolshape core library
//!
//! Normalizes the output of external CLIs (docker, git, kubectl, npm,
//! dotnet/cargo, helm, gh, curl) into typed results with a closed error
//! taxonomy, and derives a size-bounded compact projection of each result.
//!
//! Call order for one tool invocation:
//!
//! 1. a domain `*_args` builder runs the [`guard`] checks and returns an argv;
//! 2. a process runner executes it and hands back a [`RawInvocation`];
//! 3. the domain `parse_*` function builds the structured result;
//! 4. [`present`] picks the full or compact rendering.
//!
//! Everything in this crate is pure: no I/O, no shared mutable state.

pub mod classify;
pub mod domains;
pub mod extract;
pub mod guard;
pub mod ident;
pub mod outcome;
pub mod phase;
pub mod present;
pub mod raw;
pub mod telemetry;
pub mod units;

pub use classify::Classifier;
pub use guard::{GuardError, GuardResult};
pub use outcome::{ErrorKind, Outcome};
pub use present::{
    present, PresentOptions, Presentation, Present, Representation, Structured, COMPACT_LIST_LIMIT,
    PREVIEW_CHARS,
};
pub use raw::{RawInvocation, TIMEOUT_EXIT_CODE};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
