//! Content-addressed identifier normalization.

/// Length of a canonical short identifier.
pub const SHORT_ID_LEN: usize = 12;

/// Canonicalize a content-addressed identifier to its 12-hex-character prefix.
///
/// Accepts `sha256:<hex>`, bare hex, and already-short ids. Anything that is
/// not hex after the algorithm prefix is returned trimmed and unchanged.
pub fn short_id(id: &str) -> String {
    let trimmed = id.trim();
    let body = strip_algorithm(trimmed);
    if !body.is_empty() && body.chars().all(|c| c.is_ascii_hexdigit()) {
        let lowered = body.to_ascii_lowercase();
        lowered[..SHORT_ID_LEN.min(lowered.len())].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Full hex digest without its algorithm prefix, lowercased.
pub fn full_digest(id: &str) -> String {
    strip_algorithm(id.trim()).to_ascii_lowercase()
}

fn strip_algorithm(id: &str) -> &str {
    match id.split_once(':') {
        Some((algo, rest)) if !algo.is_empty() && algo.chars().all(|c| c.is_ascii_alphanumeric()) => {
            rest
        }
        _ => id,
    }
}

/// Whether `text` is a non-empty hex string.
pub fn is_hex(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_hexdigit())
}
