//! Per-tool parsers, argument builders, and error taxonomies.
//!
//! Every domain follows the same shape: guarded `*_args` builders that return
//! an argv, one `parse_*` function per action taking a [`RawInvocation`]
//! (plus request context where the output omits it), a closed error-kind
//! enum with a static classifier, and a [`Present`] impl for each result.
//!
//! [`RawInvocation`]: crate::raw::RawInvocation
//! [`Present`]: crate::present::Present

pub mod build;
pub mod docker;
pub mod gh;
pub mod git;
pub mod helm;
pub mod http;
pub mod kubectl;
pub mod npm;
