//! Volume-mount guard for `docker run -v host:container[:opts]` values.
//!
//! The host segment is lexically normalized (`.` and `..` resolved, repeated
//! separators collapsed, backslashes treated as separators) and compared
//! against a fixed denylist. Named volumes and all other paths pass.

use tracing::warn;

use super::error::{GuardError, GuardResult};

/// Host paths that may not be mounted, nor anything beneath them.
const DENIED_TREES: &[&str] = &["/etc", "/proc", "/sys", "/dev", "/root", "/var/run/docker.sock"];

/// Validate a single volume mount specification.
pub fn assert_safe_volume_mount(value: &str) -> GuardResult {
    let host = host_segment(value.trim());
    if !is_path(host) {
        return Ok(());
    }

    let normalized = normalize(host);
    if is_denied(&normalized) {
        warn!(value, host = %normalized, "rejected volume mount");
        return Err(GuardError::UnsafeVolumeMount {
            value: value.to_string(),
            host_path: normalized,
        });
    }
    Ok(())
}

/// The part of `value` before its first unescaped `:`.
///
/// A leading drive root (`C:\` or `C:/`) is part of the host path.
fn host_segment(value: &str) -> &str {
    let skip = if has_drive_prefix(value) { 3 } else { 0 };
    let mut escaped = false;
    for (idx, ch) in value.char_indices().skip_while(|(i, _)| *i < skip) {
        match ch {
            '\\' => escaped = !escaped,
            ':' if !escaped => return &value[..idx],
            _ => escaped = false,
        }
    }
    value
}

fn has_drive_prefix(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && matches!(bytes[2], b'/' | b'\\')
}

fn is_path(host: &str) -> bool {
    host.starts_with(['/', '\\', '.', '~']) || has_drive_prefix(host)
}

/// Lexically normalize a host path, resolving `.` and `..` without touching the filesystem.
fn normalize(host: &str) -> String {
    let unified = host.replace('\\', "/");
    let (root, rest) = if has_drive_prefix(&unified) {
        (format!("{}:/", unified[..1].to_ascii_lowercase()), &unified[3..])
    } else if let Some(rest) = unified.strip_prefix('/') {
        ("/".to_string(), rest)
    } else {
        (String::new(), unified.as_str())
    };

    let absolute = !root.is_empty();
    let mut parts: Vec<&str> = Vec::new();
    for part in rest.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("{root}{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

fn is_denied(normalized: &str) -> bool {
    if normalized == "/" || is_drive_root(normalized) {
        return true;
    }
    DENIED_TREES.iter().any(|tree| {
        normalized == *tree
            || normalized
                .strip_prefix(tree)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

fn is_drive_root(normalized: &str) -> bool {
    normalized.len() == 3 && has_drive_prefix(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_denylisted_trees() {
        for bad in [
            "/etc/shadow:/x",
            "/etc:/etc:ro",
            "/:/host",
            "/proc:/p",
            "/sys/fs/cgroup:/cg",
            "/dev/sda:/d",
            "/root/.ssh:/keys",
            "/var/run/docker.sock:/var/run/docker.sock",
        ] {
            assert!(assert_safe_volume_mount(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_rejects_after_normalization() {
        for bad in ["/tmp/../etc:/x", "//etc//passwd:/x", "/./proc/self:/x", "/a/b/../../..:/x"] {
            assert!(assert_safe_volume_mount(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_rejects_drive_roots() {
        for bad in ["C:\\:/x", "c:/:/x", "D:/"] {
            assert!(assert_safe_volume_mount(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_accepts_safe_mounts() {
        for ok in [
            "./data:/x",
            "/etcetera:/x",
            "/home/user/project:/app",
            "/var/run/docker.sock.bak:/x",
            "pgdata:/var/lib/postgresql/data",
            "C:\\Users\\me\\code:/app",
            "../sibling:/s",
            "~/cache:/cache",
        ] {
            assert!(assert_safe_volume_mount(ok).is_ok(), "{ok} should be accepted");
        }
    }

    #[test]
    fn test_host_segment_respects_escapes_and_drives() {
        assert_eq!(host_segment("/a\\:b:/c"), "/a\\:b");
        assert_eq!(host_segment("C:\\data:/c"), "C:\\data");
        assert_eq!(host_segment("named"), "named");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/tmp/../etc/./x"), "/etc/x");
        assert_eq!(normalize("/../.."), "/");
        assert_eq!(normalize("./a/../../b"), "../b");
        assert_eq!(normalize("C:\\Windows\\.."), "c:/");
    }

    #[test]
    fn test_error_reports_normalized_path() {
        match assert_safe_volume_mount("/tmp/../etc/shadow:/x").unwrap_err() {
            GuardError::UnsafeVolumeMount { host_path, .. } => assert_eq!(host_path, "/etc/shadow"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
