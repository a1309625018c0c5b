//! Human size and duration normalization.
//!
//! Sizes convert to bytes through a fixed unit table that covers both
//! decimal (`kB`, `MB`) and binary (`KiB`, `MiB`) prefixes. Durations
//! convert to seconds.

use std::sync::LazyLock;

use regex::Regex;

static SIZE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)\s*([A-Za-z]*)").ok());

static DURATION_PART_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([0-9]+(?:\.[0-9]+)?)\s*(milliseconds?|msecs?|ms|microseconds?|us|µs|nanoseconds?|ns|minutes?|mins?|m|seconds?|secs?|s|hours?|hrs?|h)",
    )
    .ok()
});

static CLOCK_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d+):(\d{2}):(\d{2}(?:\.\d+)?)$").ok());

/// Multiplier for a size unit suffix, or `None` for an unrecognised unit.
pub fn unit_multiplier(unit: &str) -> Option<f64> {
    let factor = match unit {
        "" | "B" | "b" => 1.0,
        "kB" | "KB" | "kb" | "K" | "k" => 1e3,
        "MB" | "mB" | "mb" | "M" => 1e6,
        "GB" | "gB" | "gb" | "G" => 1e9,
        "TB" | "tB" | "tb" | "T" => 1e12,
        "PB" | "pB" | "pb" | "P" => 1e15,
        "KiB" | "kiB" | "Ki" => 1024.0,
        "MiB" | "Mi" => 1024.0 * 1024.0,
        "GiB" | "Gi" => 1024.0 * 1024.0 * 1024.0,
        "TiB" | "Ti" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some(factor)
}

/// Parse a human size such as `43.2MB`, `150MiB`, or `0B` into bytes.
///
/// Trailing text after the unit (docker's `"10MB (virtual 80MB)"`) is ignored.
pub fn parse_size(text: &str) -> Option<u64> {
    let re = SIZE_RE.as_ref()?;
    let caps = re.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let factor = unit_multiplier(caps.get(2).map_or("", |m| m.as_str()))?;
    Some((value * factor).round() as u64)
}

/// Parse a duration such as `2.5s`, `42 ms`, `1m30s`, or `00:00:03.21` into seconds.
pub fn parse_duration_secs(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = CLOCK_RE.as_ref().and_then(|re| re.captures(text)) {
        let hours: f64 = caps[1].parse().ok()?;
        let minutes: f64 = caps[2].parse().ok()?;
        let seconds: f64 = caps[3].parse().ok()?;
        return Some(hours * 3600.0 + minutes * 60.0 + seconds);
    }

    let re = DURATION_PART_RE.as_ref()?;
    let mut total = 0.0;
    let mut consumed = 0;
    for caps in re.captures_iter(text) {
        let whole = caps.get(0)?;
        if !text[consumed..whole.start()].trim().is_empty() {
            return None;
        }
        consumed = whole.end();
        let value: f64 = caps[1].parse().ok()?;
        total += to_seconds(value, &caps[2].to_ascii_lowercase());
    }
    if consumed == 0 || !text[consumed..].trim().is_empty() {
        return None;
    }
    Some(total)
}

fn to_seconds(value: f64, unit: &str) -> f64 {
    match unit {
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => value / 1e3,
        "us" | "µs" | "microsecond" | "microseconds" => value / 1e6,
        "ns" | "nanosecond" | "nanoseconds" => value / 1e9,
        "m" | "min" | "mins" | "minute" | "minutes" => value * 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => value * 3600.0,
        _ => value,
    }
}

/// Render a byte count with decimal prefixes, e.g. `43.2MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["kB", "MB", "GB", "TB", "PB"];
    if bytes < 1000 {
        return format!("{bytes}B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    format!("{value:.1}{unit}")
}

/// Render seconds with millisecond precision trimmed, e.g. `2.5s`.
pub fn format_secs(secs: f64) -> String {
    let rounded = (secs * 1000.0).round() / 1000.0;
    format!("{rounded}s")
}
