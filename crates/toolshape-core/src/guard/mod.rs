//! Input safety guard: pure validators run before any external command.
//!
//! Every function here inspects one caller-supplied string and either returns
//! `Ok(())` or a [`GuardError`] naming the offending input. Guards never
//! rewrite their input and share no state, so a rejected call spawns no
//! process and leaves nothing behind.
//!
//! # Modules
//!
//! - [`flag`]: `assert_no_flag_injection`
//! - [`port`]: `assert_valid_port_mapping`
//! - [`volume`]: `assert_safe_volume_mount`
//! - [`net`]: `assert_safe_url`, `assert_safe_header`, `assert_allowed_method`
//! - [`error`]: `GuardError` / `GuardResult`

pub mod error;
pub mod flag;
pub mod net;
pub mod port;
pub mod volume;

pub use error::{GuardError, GuardResult};
pub use flag::{assert_no_flag_injection, assert_no_flag_injection_all};
pub use net::{assert_allowed_method, assert_safe_header, assert_safe_url};
pub use port::assert_valid_port_mapping;
pub use volume::assert_safe_volume_mount;

/// Characters and sequences a shell would treat as command syntax.
pub(crate) const SHELL_METACHARACTERS: &[&str] = &[";", "$(", "`", "|", "&", "<", ">", "\n", "\r"];

pub(crate) fn contains_shell_metacharacters(value: &str) -> bool {
    SHELL_METACHARACTERS.iter().any(|meta| value.contains(meta))
}
