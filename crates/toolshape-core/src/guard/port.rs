//! Port-mapping guard for `docker run -p` style values.
//!
//! Grammar: `[host_ip:]hostport[-hostport]:containerport[-containerport][/proto]`
//! with `proto` one of `tcp`, `udp`, `sctp`. `host_ip` is a dotted IPv4
//! address or a bracketed IPv6 address.

use std::net::{Ipv4Addr, Ipv6Addr};

use tracing::warn;

use super::contains_shell_metacharacters;
use super::error::{GuardError, GuardResult};

const PROTOCOLS: &[&str] = &["tcp", "udp", "sctp"];

/// Validate a single port mapping.
pub fn assert_valid_port_mapping(value: &str) -> GuardResult {
    check(value).map_err(|reason| {
        warn!(value, %reason, "rejected port mapping");
        GuardError::port(value, reason)
    })
}

fn check(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("empty mapping".to_string());
    }
    if value.trim_start().starts_with('-') {
        return Err("looks like a command-line flag".to_string());
    }
    if contains_shell_metacharacters(value) {
        return Err("contains shell metacharacters".to_string());
    }
    if value.chars().any(char::is_whitespace) {
        return Err("contains whitespace".to_string());
    }

    let spec = match value.rsplit_once('/') {
        Some((spec, proto)) => {
            if !PROTOCOLS.contains(&proto) {
                return Err(format!("unsupported protocol {proto:?}"));
            }
            spec
        }
        None => value,
    };

    let ports = split_host_ip(spec)?;
    let (host, container) = ports
        .split_once(':')
        .ok_or_else(|| "expected hostport:containerport".to_string())?;

    let host = parse_range(host)?;
    let container = parse_range(container)?;

    let container_is_range = container.0 != container.1;
    if container_is_range && host.1 - host.0 != container.1 - container.0 {
        return Err("host and container port ranges differ in size".to_string());
    }
    Ok(())
}

/// Strip and validate an optional `host_ip:` prefix, returning the port part.
fn split_host_ip(spec: &str) -> Result<&str, String> {
    if let Some(rest) = spec.strip_prefix('[') {
        let (ip, after) = rest
            .split_once(']')
            .ok_or_else(|| "unterminated IPv6 host".to_string())?;
        ip.parse::<Ipv6Addr>()
            .map_err(|_| format!("invalid IPv6 host {ip:?}"))?;
        return after
            .strip_prefix(':')
            .ok_or_else(|| "expected ':' after IPv6 host".to_string());
    }

    match spec.matches(':').count() {
        1 => Ok(spec),
        2 => {
            let (ip, rest) = spec
                .split_once(':')
                .ok_or_else(|| "malformed host".to_string())?;
            ip.parse::<Ipv4Addr>()
                .map_err(|_| format!("invalid host ip {ip:?}"))?;
            Ok(rest)
        }
        _ => Err("expected [host_ip:]hostport:containerport".to_string()),
    }
}

fn parse_range(text: &str) -> Result<(u32, u32), String> {
    match text.split_once('-') {
        Some((start, end)) => {
            let start = parse_port(start)?;
            let end = parse_port(end)?;
            if start > end {
                return Err(format!("port range {text:?} is reversed"));
            }
            Ok((start, end))
        }
        None => {
            let port = parse_port(text)?;
            Ok((port, port))
        }
    }
}

fn parse_port(text: &str) -> Result<u32, String> {
    if text.is_empty() || text.len() > 5 || !text.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("port {text:?} is not numeric"));
    }
    let port: u32 = text
        .parse()
        .map_err(|_| format!("port {text:?} is not numeric"))?;
    if !(1..=65535).contains(&port) {
        return Err(format!("port {port} is outside 1-65535"));
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_forms() {
        for ok in [
            "8080:80",
            "8080:80/tcp",
            "53:53/udp",
            "9000:9000/sctp",
            "127.0.0.1:8080:80",
            "0.0.0.0:443:443/tcp",
            "[::1]:8080:80",
            "8000-8010:8000-8010",
            "8000-8010:80",
            "65535:1",
        ] {
            assert!(assert_valid_port_mapping(ok).is_ok(), "{ok} should be accepted");
        }
    }

    #[test]
    fn test_rejects_out_of_range_and_non_numeric() {
        for bad in ["999999:80", "0:80", "8080:65536", "http:80", "80a:80", "8080:"] {
            assert!(assert_valid_port_mapping(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_rejects_flags_and_shell_syntax() {
        for bad in ["-p 8080:80", "--publish=80:80", "8080:80;rm -rf /", "$(id):80", "`id`:80", "80:80 "] {
            assert!(assert_valid_port_mapping(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_rejects_malformed_hosts_and_protocols() {
        for bad in [
            "localhost:8080:80",
            "999.1.1.1:8080:80",
            "[::1:8080:80",
            "[zz]:8080:80",
            "1.2.3.4:5:6:7",
            "8080:80/icmp",
            "80",
            "8010-8000:80",
            "8000-8010:80-81",
        ] {
            assert!(assert_valid_port_mapping(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_error_carries_reason() {
        let err = assert_valid_port_mapping("999999:80").unwrap_err();
        match err {
            GuardError::InvalidPortMapping { value, reason } => {
                assert_eq!(value, "999999:80");
                assert!(reason.contains("not numeric") || reason.contains("outside"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
