//! Flag-injection guard.

use tracing::warn;

use super::error::{GuardError, GuardResult};

/// Reject a positional value that a CLI would parse as an option.
///
/// Leading whitespace is ignored, so `"  --privileged"` is rejected as well.
pub fn assert_no_flag_injection(value: &str, param: &str) -> GuardResult {
    if value.trim_start().starts_with('-') {
        warn!(param, value, "rejected flag-like value");
        return Err(GuardError::FlagInjection {
            param: param.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Apply [`assert_no_flag_injection`] to every value of a list parameter.
pub fn assert_no_flag_injection_all<S: AsRef<str>>(values: &[S], param: &str) -> GuardResult {
    values
        .iter()
        .try_for_each(|value| assert_no_flag_injection(value.as_ref(), param))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_long_and_short_flags() {
        assert!(assert_no_flag_injection("--privileged", "image").is_err());
        assert!(assert_no_flag_injection("-v", "name").is_err());
        assert!(assert_no_flag_injection("-", "name").is_err());
    }

    #[test]
    fn test_rejects_after_leading_whitespace() {
        let err = assert_no_flag_injection(" \t--exec=sh", "ref").unwrap_err();
        assert_eq!(
            err,
            GuardError::FlagInjection {
                param: "ref".to_string(),
                value: " \t--exec=sh".to_string()
            }
        );
    }

    #[test]
    fn test_accepts_plain_values() {
        assert!(assert_no_flag_injection("nginx:latest", "image").is_ok());
        assert!(assert_no_flag_injection("feature/x-y", "branch").is_ok());
        assert!(assert_no_flag_injection("", "name").is_ok());
        assert!(assert_no_flag_injection("a--b", "name").is_ok());
    }

    #[test]
    fn test_list_variant_stops_at_first_offender() {
        let err = assert_no_flag_injection_all(&["lodash", "--ignore-scripts", "-g"], "packages")
            .unwrap_err();
        assert!(err.to_string().contains("--ignore-scripts"));
        assert!(assert_no_flag_injection_all(&["lodash", "react@18"], "packages").is_ok());
    }
}
