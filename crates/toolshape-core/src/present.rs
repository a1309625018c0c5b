//! Full/compact dual representation.
//!
//! Every structured result can be rendered in full, or projected onto a
//! smaller compact shape and rendered from that. [`present`] picks one of the
//! two for a response: the full form when the caller forces it, otherwise the
//! compact form unless it would be larger than the raw CLI text it replaces.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum number of list entries kept by a compact projection.
pub const COMPACT_LIST_LIMIT: usize = 10;

/// Maximum characters kept when a text blob is replaced by a preview.
pub const PREVIEW_CHARS: usize = 200;

/// A structured result with a full and a compact representation.
///
/// `project_compact` must be a pure function of `self`: equal inputs give
/// byte-identical compact values.
pub trait Present: Serialize {
    type Compact: Serialize;

    /// Multi-line rendering of every field.
    fn format_full(&self) -> String;

    /// Per-domain subset/derivation of this result.
    fn project_compact(&self) -> Self::Compact;

    /// Rendering of a compact projection.
    fn format_compact(compact: &Self::Compact) -> String;
}

/// Caller-side presentation settings, passed explicitly at each call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentOptions {
    /// Always return the full representation.
    #[serde(default)]
    pub force_full: bool,
}

impl PresentOptions {
    pub fn present<T: Present>(&self, result: T, raw_text: &str) -> Presentation<T, T::Compact> {
        present(result, raw_text, self.force_full)
    }
}

/// Which representation was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    Full,
    Compact,
}

/// The structured payload of a presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Structured<F, C> {
    Full(F),
    Compact(C),
}

/// Structured payload plus its text rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation<F, C> {
    pub structured: Structured<F, C>,
    pub text: String,
}

impl<F, C> Presentation<F, C> {
    pub fn representation(&self) -> Representation {
        match self.structured {
            Structured::Full(_) => Representation::Full,
            Structured::Compact(_) => Representation::Compact,
        }
    }
}

/// Choose between full and compact output for `result`.
///
/// `raw_text` is the unprocessed CLI output the response stands in for. The
/// compact form is used when its serialized size does not exceed that text
/// (ties go to compact); `force_full` always returns the full form.
pub fn present<T: Present>(result: T, raw_text: &str, force_full: bool) -> Presentation<T, T::Compact> {
    if force_full {
        return full(result);
    }

    let compact = result.project_compact();
    let compact_len = serde_json::to_string(&compact)
        .map(|json| json.len())
        .unwrap_or(usize::MAX);

    if compact_len <= raw_text.len() {
        debug!(compact_len, raw_len = raw_text.len(), "selected compact representation");
        Presentation {
            text: T::format_compact(&compact),
            structured: Structured::Compact(compact),
        }
    } else {
        debug!(compact_len, raw_len = raw_text.len(), "selected full representation");
        full(result)
    }
}

fn full<T: Present>(result: T) -> Presentation<T, T::Compact> {
    Presentation {
        text: result.format_full(),
        structured: Structured::Full(result),
    }
}

/// First `limit` items of `items`, cloned.
pub fn cap<T: Clone>(items: &[T], limit: usize) -> Vec<T> {
    items.iter().take(limit).cloned().collect()
}

/// Map the first `limit` items of `items`.
pub fn cap_map<T, U>(items: &[T], limit: usize, f: impl Fn(&T) -> U) -> Vec<U> {
    items.iter().take(limit).map(f).collect()
}

/// Shorten `text` to at most `max_chars` characters, marking truncation with `…`.
pub fn preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let mut chars = trimmed.char_indices();
    match chars.nth(max_chars) {
        None => trimmed.to_string(),
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
    }
}

/// Trailer line noting how many entries a capped list left out.
pub fn more_line(total: usize, shown: usize) -> Option<String> {
    (total > shown).then(|| format!("  … and {} more", total - shown))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Listing {
        names: Vec<String>,
        blob: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct ListingCompact {
        names: Vec<String>,
        total: usize,
    }

    impl Present for Listing {
        type Compact = ListingCompact;

        fn format_full(&self) -> String {
            format!("{}\n{}", self.names.join("\n"), self.blob)
        }

        fn project_compact(&self) -> ListingCompact {
            ListingCompact {
                names: cap(&self.names, COMPACT_LIST_LIMIT),
                total: self.names.len(),
            }
        }

        fn format_compact(compact: &ListingCompact) -> String {
            format!("{} names: {}", compact.total, compact.names.join(","))
        }
    }

    fn listing(n: usize) -> Listing {
        Listing {
            names: (0..n).map(|i| format!("n{i}")).collect(),
            blob: "x".repeat(500),
        }
    }

    #[test]
    fn test_force_full_wins() {
        let presented = present(listing(3), &"y".repeat(10_000), true);
        assert_eq!(presented.representation(), Representation::Full);
        assert!(presented.text.contains(&"x".repeat(500)));
    }

    #[test]
    fn test_compact_when_smaller_than_raw() {
        let presented = present(listing(30), &"y".repeat(10_000), false);
        assert_eq!(presented.representation(), Representation::Compact);
        match presented.structured {
            Structured::Compact(c) => {
                assert_eq!(c.names.len(), COMPACT_LIST_LIMIT);
                assert_eq!(c.total, 30);
            }
            Structured::Full(_) => panic!("expected compact"),
        }
    }

    #[test]
    fn test_full_when_raw_is_tiny() {
        let presented = present(listing(3), "ok", false);
        assert_eq!(presented.representation(), Representation::Full);
    }

    #[test]
    fn test_tie_goes_to_compact() {
        let item = listing(1);
        let json = serde_json::to_string(&item.project_compact()).unwrap();
        let raw = "r".repeat(json.len());
        let presented = present(item, &raw, false);
        assert_eq!(presented.representation(), Representation::Compact);
    }

    #[test]
    fn test_compact_projection_is_deterministic() {
        let item = listing(25);
        let a = serde_json::to_string(&item.project_compact()).unwrap();
        let b = serde_json::to_string(&item.project_compact()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("héllo wörld", 4), "héll…");
        assert_eq!(preview("  short  ", 10), "short");
        assert_eq!(preview("exact", 5), "exact");
    }

    #[test]
    fn test_more_line() {
        assert_eq!(more_line(12, 10).as_deref(), Some("  … and 2 more"));
        assert!(more_line(10, 10).is_none());
    }
}
