//! HTTP requests through `curl`.
//!
//! curl is run with `-i` so response headers precede the body, and with a
//! `-w` trailer carrying total time and download size. When redirects are
//! followed every hop prints its own header block; the last one describes
//! the response that produced the body.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::guard::{assert_allowed_method, assert_safe_header, assert_safe_url, GuardResult};
use crate::outcome::Outcome;
use crate::present::{preview, Present, PREVIEW_CHARS};
use crate::raw::RawInvocation;
use crate::units::{format_bytes, format_secs};

/// Marker that starts the `-w` trailer line.
pub const TIMING_MARKER: &str = "__TIMING__";

/// `-w` format appended to every request.
pub const WRITE_OUT: &str = "\n__TIMING__ %{time_total} %{size_download}";

crate::error_kinds! {
    pub enum HttpErrorKind {
        DnsResolution => "dns-resolution",
        ConnectionRefused => "connection-refused",
        Timeout => "timeout",
        Tls => "tls",
        Unknown => "unknown",
    }
}

pub static HTTP_ERRORS: LazyLock<Classifier<HttpErrorKind>> = LazyLock::new(|| {
    Classifier::new()
        .pattern(r"could not resolve host|could not resolve proxy|name or service not known", HttpErrorKind::DnsResolution)
        .pattern(r"\bssl\b|\btls\b|certificate", HttpErrorKind::Tls)
        .pattern(r"operation timed out|connection timed out|timeout was reached", HttpErrorKind::Timeout)
        .pattern(r"connection refused|failed to connect|couldn't connect", HttpErrorKind::ConnectionRefused)
});

/// One request header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Caller parameters for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpArgs {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub follow_redirects: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

impl HttpArgs {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            headers: Vec::new(),
            body: None,
            follow_redirects: false,
        }
    }
}

/// `curl -sS -i -w <trailer> -X METHOD [-L] [-H ..] [--data-raw ..] URL`
pub fn curl_args(args: &HttpArgs) -> GuardResult<Vec<String>> {
    assert_safe_url(&args.url)?;
    assert_allowed_method(&args.method)?;
    for header in &args.headers {
        assert_safe_header(&header.name, &header.value)?;
    }

    let method = args.method.trim().to_ascii_uppercase();
    let mut argv = vec![
        "-sS".to_string(),
        "-i".to_string(),
        "-w".to_string(),
        WRITE_OUT.to_string(),
    ];
    if method == "HEAD" {
        argv.push("--head".to_string());
    } else {
        argv.push("-X".to_string());
        argv.push(method);
    }
    if args.follow_redirects {
        argv.push("-L".to_string());
    }
    for header in &args.headers {
        argv.push("-H".to_string());
        argv.push(format!("{}: {}", header.name.trim(), header.value.trim()));
    }
    if let Some(body) = &args.body {
        // `--data-raw` never treats a leading `@` as a file reference.
        argv.push("--data-raw".to_string());
        argv.push(body.clone());
    }
    argv.push(args.url.trim().to_string());
    Ok(argv)
}

/// Result of an HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    #[serde(flatten)]
    pub outcome: Outcome<HttpErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_version: Option<String>,
    pub headers: Vec<Header>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub body: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_secs: Option<f64>,
    /// Header blocks seen before the final one.
    pub redirects: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponseCompact {
    #[serde(flatten)]
    pub outcome: Outcome<HttpErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub body_preview: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_secs: Option<f64>,
    pub redirects: usize,
}

struct HeaderBlock {
    version: String,
    status: Option<u16>,
    status_text: String,
    headers: Vec<Header>,
}

/// Split off the `-w` trailer, returning the response text and `(time, size)`.
fn split_trailer(stdout: &str) -> (&str, Option<f64>, Option<u64>) {
    let Some(idx) = stdout.rfind(TIMING_MARKER) else {
        return (stdout, None, None);
    };
    let mut fields = stdout[idx + TIMING_MARKER.len()..].split_whitespace();
    let time = fields.next().and_then(|t| t.parse().ok());
    let size = fields
        .next()
        .and_then(|s| s.parse::<f64>().ok())
        .map(|s| s as u64);
    let response = stdout[..idx].strip_suffix('\n').unwrap_or(&stdout[..idx]);
    (response, time, size)
}

/// Read one header block from the start of `text`, returning it and the rest.
fn take_header_block(text: &str) -> Option<(HeaderBlock, &str)> {
    if !text.starts_with("HTTP/") {
        return None;
    }
    let (head, rest) = match (text.find("\r\n\r\n"), text.find("\n\n")) {
        (Some(a), Some(b)) if b < a => (&text[..b], &text[b + 2..]),
        (Some(a), _) => (&text[..a], &text[a + 4..]),
        (None, Some(b)) => (&text[..b], &text[b + 2..]),
        (None, None) => (text, ""),
    };
    let mut lines = head.lines().map(|l| l.trim_end_matches('\r'));
    let status_line = lines.next()?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default().to_string();
    let status = parts.next().and_then(|s| s.parse().ok());
    let status_text = parts.next().unwrap_or_default().trim().to_string();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| Header {
            name: name.trim().to_string(),
            value: value.trim().to_string(),
        })
        .collect();
    Some((
        HeaderBlock {
            version,
            status,
            status_text,
            headers,
        },
        rest,
    ))
}

/// Parse curl output produced by [`curl_args`].
pub fn parse_http(raw: &RawInvocation) -> HttpResponse {
    let (response, time_secs, size) = split_trailer(&raw.stdout);

    let mut rest = response;
    let mut blocks = Vec::new();
    while let Some((block, remaining)) = take_header_block(rest) {
        blocks.push(block);
        rest = remaining;
    }
    let last = blocks.pop();
    // Interim `100 Continue` and proxy `CONNECT` blocks are not redirects.
    let redirects = blocks
        .iter()
        .filter(|b| b.status.is_some_and(|s| (300..400).contains(&s)))
        .count();
    let body = rest.to_string();

    // The body is whatever the server sent, so only curl's stderr is classified.
    let outcome = if raw.is_timeout() {
        Outcome::failed(HttpErrorKind::Timeout, raw.failure_message())
    } else if raw.succeeded() {
        Outcome::Succeeded
    } else {
        Outcome::failed(HTTP_ERRORS.classify(&raw.stderr), raw.failure_message())
    };

    let (status, status_text, http_version, headers) = match last {
        Some(block) => (
            block.status,
            Some(block.status_text).filter(|t| !t.is_empty()),
            Some(block.version),
            block.headers,
        ),
        None => (None, None, None, Vec::new()),
    };
    let content_type = headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("content-type"))
        .map(|h| h.value.clone());

    HttpResponse {
        outcome,
        status,
        status_text,
        http_version,
        content_type,
        size_bytes: size.unwrap_or(body.len() as u64),
        body,
        headers,
        time_secs,
        redirects,
    }
}

impl Present for HttpResponse {
    type Compact = HttpResponseCompact;

    fn format_full(&self) -> String {
        let mut out = match self.status {
            Some(status) => format!(
                "{} {status} {}\n",
                self.http_version.as_deref().unwrap_or("HTTP"),
                self.status_text.as_deref().unwrap_or_default()
            ),
            None => format!("http: {}\n", self.outcome.headline()),
        };
        for h in &self.headers {
            out.push_str(&format!("{}: {}\n", h.name, h.value));
        }
        out.push('\n');
        out.push_str(&self.body);
        if !self.body.ends_with('\n') {
            out.push('\n');
        }
        let mut meta = vec![format_bytes(self.size_bytes)];
        if let Some(secs) = self.time_secs {
            meta.push(format_secs(secs));
        }
        if self.redirects > 0 {
            meta.push(format!("{} redirect(s)", self.redirects));
        }
        out.push_str(&format!("({})\n", meta.join(", ")));
        out
    }

    fn project_compact(&self) -> HttpResponseCompact {
        HttpResponseCompact {
            outcome: self.outcome.clone(),
            status: self.status,
            status_text: self.status_text.clone(),
            content_type: self.content_type.clone(),
            body_preview: preview(&self.body, PREVIEW_CHARS),
            size_bytes: self.size_bytes,
            time_secs: self.time_secs,
            redirects: self.redirects,
        }
    }

    fn format_compact(compact: &HttpResponseCompact) -> String {
        let head = match compact.status {
            Some(status) => format!(
                "{status} {}, {}{}",
                compact.content_type.as_deref().unwrap_or("-"),
                format_bytes(compact.size_bytes),
                compact
                    .time_secs
                    .map(|t| format!(" in {}", format_secs(t)))
                    .unwrap_or_default()
            ),
            None => format!("http: {}", compact.outcome.headline()),
        };
        if compact.body_preview.is_empty() {
            format!("{head}\n")
        } else {
            format!("{head}\n{}\n", compact.body_preview)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(parts: &[&str], trailer: &str) -> String {
        format!("{}\n{TIMING_MARKER} {trailer}", parts.concat())
    }

    #[test]
    fn test_simple_response() {
        let stdout = response(
            &[
                "HTTP/2 200 \r\n",
                "content-type: application/json\r\n",
                "x-request-id: abc\r\n",
                "\r\n",
                "{\"ok\":true}",
            ],
            "0.123456 11",
        );
        let result = parse_http(&RawInvocation::new(stdout, "", 0));
        assert!(result.outcome.is_success());
        assert_eq!(result.status, Some(200));
        assert_eq!(result.http_version.as_deref(), Some("HTTP/2"));
        assert_eq!(result.content_type.as_deref(), Some("application/json"));
        assert_eq!(result.body, "{\"ok\":true}");
        assert_eq!(result.size_bytes, 11);
        assert_eq!(result.time_secs, Some(0.123456));
        assert_eq!(result.redirects, 0);
    }

    #[test]
    fn test_last_header_block_wins() {
        let stdout = response(
            &[
                "HTTP/1.1 301 Moved Permanently\r\n",
                "Location: https://example.com/\r\n",
                "Content-Type: text/html\r\n",
                "\r\n",
                "HTTP/1.1 200 OK\r\n",
                "Content-Type: text/plain\r\n",
                "\r\n",
                "hello",
            ],
            "0.5 5",
        );
        let result = parse_http(&RawInvocation::new(stdout, "", 0));
        assert_eq!(result.status, Some(200));
        assert_eq!(result.status_text.as_deref(), Some("OK"));
        assert_eq!(result.content_type.as_deref(), Some("text/plain"));
        assert_eq!(result.redirects, 1);
        assert_eq!(result.body, "hello");
    }

    #[test]
    fn test_interim_blocks_are_not_redirects() {
        let stdout = response(
            &[
                "HTTP/1.1 200 Connection established\r\n",
                "\r\n",
                "HTTP/1.1 100 Continue\r\n",
                "\r\n",
                "HTTP/1.1 302 Found\r\n",
                "Location: /next\r\n",
                "\r\n",
                "HTTP/1.1 201 Created\r\n",
                "\r\n",
                "done",
            ],
            "0.2 4",
        );
        let result = parse_http(&RawInvocation::new(stdout, "", 0));
        assert_eq!(result.status, Some(201));
        assert_eq!(result.redirects, 1);
        assert_eq!(result.body, "done");
    }

    #[test]
    fn test_body_text_does_not_drive_classification() {
        let stdout = format!("<p>Renew your TLS certificate before it expires</p>\n{TIMING_MARKER} 0.000000 0");
        let stderr = "curl: (7) Failed to connect to api.internal port 443 after 3 ms: Connection refused";
        let result = parse_http(&RawInvocation::new(stdout, stderr, 7));
        assert_eq!(result.outcome.kind(), Some(HttpErrorKind::ConnectionRefused));
    }

    #[test]
    fn test_compact_previews_body() {
        let body = "a".repeat(1000);
        let stdout = response(&["HTTP/1.1 200 OK\r\n\r\n", &body], "1.0 1000");
        let result = parse_http(&RawInvocation::new(stdout, "", 0));
        let compact = result.project_compact();
        assert_eq!(compact.body_preview.chars().count(), PREVIEW_CHARS + 1);
        assert_eq!(compact.size_bytes, 1000);
        let text = HttpResponse::format_compact(&compact);
        assert!(text.starts_with("200 -, 1.0kB in 1s\n"));
    }

    #[test]
    fn test_error_kinds() {
        let cases = [
            ("curl: (6) Could not resolve host: nope.invalid", 6, HttpErrorKind::DnsResolution),
            (
                "curl: (7) Failed to connect to localhost port 9 after 0 ms: Connection refused",
                7,
                HttpErrorKind::ConnectionRefused,
            ),
            (
                "curl: (28) Operation timed out after 5001 milliseconds with 0 bytes received",
                28,
                HttpErrorKind::Timeout,
            ),
            (
                "curl: (60) SSL certificate problem: self-signed certificate",
                60,
                HttpErrorKind::Tls,
            ),
        ];
        for (stderr, code, expected) in cases {
            let stdout = format!("\n{TIMING_MARKER} 0.000000 0");
            let result = parse_http(&RawInvocation::new(stdout, stderr, code));
            assert_eq!(result.outcome.kind(), Some(expected), "{stderr}");
            assert!(result.status.is_none());
        }
    }

    #[test]
    fn test_runner_timeout_is_timeout_kind() {
        let result = parse_http(&RawInvocation::new("", "", 0).with_timeout());
        assert_eq!(result.outcome.kind(), Some(HttpErrorKind::Timeout));
    }

    #[test]
    fn test_curl_args_guarded() {
        let args = HttpArgs {
            headers: vec![Header {
                name: "X-Test".to_string(),
                value: "a\r\nInjected: 1".to_string(),
            }],
            ..HttpArgs::get("https://api.example.com")
        };
        assert!(curl_args(&args).is_err());
        assert!(curl_args(&HttpArgs::get("file:///etc/passwd")).is_err());

        let args = HttpArgs {
            method: "TRACE".to_string(),
            ..HttpArgs::get("https://api.example.com")
        };
        assert!(curl_args(&args).is_err());

        let argv = curl_args(&HttpArgs::get("https://api.example.com")).unwrap();
        assert_eq!(argv.last().map(String::as_str), Some("https://api.example.com"));
        assert!(argv.contains(&WRITE_OUT.to_string()));
    }
}
