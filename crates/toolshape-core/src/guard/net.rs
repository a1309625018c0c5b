//! URL, header, and method guards for HTTP tools.

use tracing::warn;
use url::Url;

use super::error::{GuardError, GuardResult};

const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

const ALLOWED_METHODS: &[&str] = &["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

/// Accept only absolute `http`/`https` URLs.
///
/// The scheme comparison is case-insensitive. Control characters are
/// rejected outright because URL parsers silently strip some of them while
/// the raw string would still reach the command line.
pub fn assert_safe_url(value: &str) -> GuardResult {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GuardError::url(value, "url is empty"));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(GuardError::url(value, "url contains control characters"));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|err| GuardError::url(value, format!("not an absolute url ({err})")))?;

    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        warn!(scheme = parsed.scheme(), "rejected url scheme");
        return Err(GuardError::url(
            value,
            format!("scheme {:?} is not allowed", parsed.scheme()),
        ));
    }
    Ok(())
}

/// Reject header names or values that could split a request or response.
pub fn assert_safe_header(name: &str, value: &str) -> GuardResult {
    let unsafe_char = |c: char| matches!(c, '\r' | '\n' | '\0');
    if name.contains(unsafe_char) || value.contains(unsafe_char) {
        warn!(header = name.escape_debug().to_string(), "rejected header");
        return Err(GuardError::UnsafeHeader {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Accept standard HTTP methods only, case-insensitively.
pub fn assert_allowed_method(method: &str) -> GuardResult {
    let upper = method.trim().to_ascii_uppercase();
    if ALLOWED_METHODS.contains(&upper.as_str()) {
        Ok(())
    } else {
        Err(GuardError::MethodNotAllowed {
            method: method.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        assert!(assert_safe_url("https://api.example.com").is_ok());
        assert!(assert_safe_url("http://localhost:8080/health?x=1").is_ok());
        assert!(assert_safe_url("  HTTPS://Example.com/Path ").is_ok());
    }

    #[test]
    fn test_rejects_other_schemes() {
        for bad in [
            "file:///etc/passwd",
            "ftp://example.com/x",
            "gopher://example.com",
            "dict://localhost:11211/stat",
            "data:text/plain,hello",
            "javascript:alert(1)",
            "FILE:///etc/passwd",
            "ssh://host",
        ] {
            assert!(assert_safe_url(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_rejects_empty_relative_and_control_chars() {
        assert!(assert_safe_url("").is_err());
        assert!(assert_safe_url("   ").is_err());
        assert!(assert_safe_url("/relative/path").is_err());
        assert!(assert_safe_url("-K/etc/passwd").is_err());
        assert!(assert_safe_url("https://example.com/\r\nHost: evil").is_err());
    }

    #[test]
    fn test_header_guard() {
        assert!(assert_safe_header("Accept", "application/json").is_ok());
        assert!(assert_safe_header("X-Evil\r\n", "v").is_err());
        assert!(assert_safe_header("X-Ok", "a\nb").is_err());
        assert!(assert_safe_header("X-Ok", "a\0b").is_err());
        assert!(assert_safe_header("X-Ok", "a\rb").is_err());
    }

    #[test]
    fn test_method_guard() {
        assert!(assert_allowed_method("get").is_ok());
        assert!(assert_allowed_method("DELETE").is_ok());
        assert!(assert_allowed_method("CONNECT").is_err());
        assert!(assert_allowed_method("-X").is_err());
    }
}
