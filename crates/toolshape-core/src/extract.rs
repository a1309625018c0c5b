//! JSON-then-text extraction primitives shared by the domain parsers.
//!
//! Parsers are expressed as an ordered list of [`Strategy`] values (tried in
//! order until one yields data) and, for free text, an ordered list of
//! [`LineRule`] values where each line is consumed by the first rule that
//! accepts it. Both lists are plain data so grammar priority is visible in
//! one place and every entry can be tested on its own.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::raw::RawInvocation;

/// One way of turning a raw invocation into canonical data.
pub struct Strategy<T> {
    pub name: &'static str,
    pub extract: fn(&RawInvocation) -> Option<T>,
}

/// Run strategies in order and return the first one that yields data.
pub fn first_success<T>(raw: &RawInvocation, strategies: &[Strategy<T>]) -> Option<T> {
    for strategy in strategies {
        if let Some(value) = (strategy.extract)(raw) {
            debug!(strategy = strategy.name, "extraction strategy matched");
            return Some(value);
        }
    }
    debug!("no extraction strategy matched");
    None
}

/// A line-oriented grammar entry.
///
/// `apply` returns `true` when it recognised and consumed the line.
pub struct LineRule<A> {
    pub name: &'static str,
    pub apply: fn(&str, &mut A) -> bool,
}

/// Feed every line of `text` to the first rule that accepts it.
///
/// Returns how many lines were consumed by some rule.
pub fn scan_lines<A>(text: &str, rules: &[LineRule<A>], acc: &mut A) -> usize {
    let mut matched = 0;
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if rules.iter().any(|rule| (rule.apply)(line, acc)) {
            matched += 1;
        }
    }
    matched
}

/// Decode the first JSON object in `text`, tolerating banner text before it
/// and trailing text after it.
pub fn json_object<T: DeserializeOwned>(text: &str) -> Option<T> {
    let start = text.find('{')?;
    decode_prefix(&text[start..])
}

/// Decode every line that holds a standalone JSON object (NDJSON).
///
/// Lines that fail to decode are skipped. A document that opens with `[` is
/// a pretty-printed array, not NDJSON, and yields nothing.
pub fn json_lines<T: DeserializeOwned>(text: &str) -> Vec<T> {
    if text.trim_start().starts_with('[') {
        return Vec::new();
    }
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

/// Decode a JSON array that opens before any object in `text`, one element
/// at a time.
///
/// Elements that do not fit `T` are skipped, so one odd record cannot hide
/// the rest. `None` means no array was found or it is not valid JSON.
pub fn json_array<T: DeserializeOwned>(text: &str) -> Option<Vec<T>> {
    let start = text.find(['{', '['])?;
    if !text[start..].starts_with('[') {
        return None;
    }
    let values: Vec<Value> = decode_prefix(&text[start..])?;
    Some(json_items(values))
}

/// Decode each value as `T`, skipping the ones that do not fit.
pub fn json_items<T: DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(err) => {
                debug!(%err, "skipping undecodable item");
                None
            }
        })
        .collect()
}

fn decode_prefix<T: DeserializeOwned>(text: &str) -> Option<T> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<T>();
    match stream.next() {
        Some(Ok(value)) => Some(value),
        Some(Err(err)) => {
            debug!(%err, "json decode failed, falling back");
            None
        }
        None => None,
    }
}

/// Split a whitespace-aligned table row at runs of two or more spaces.
pub fn split_columns(line: &str) -> Vec<&str> {
    let mut cols = Vec::new();
    let mut rest = line.trim();
    while !rest.is_empty() {
        match rest.find("  ") {
            Some(idx) => {
                cols.push(&rest[..idx]);
                rest = rest[idx..].trim_start();
            }
            None => {
                cols.push(rest);
                break;
            }
        }
    }
    cols
}

/// Column positions learned from a table header such as `docker ps` prints.
///
/// Headers are split at runs of two or more spaces; rows are then sliced at
/// the same character offsets, which keeps empty cells (a container without
/// ports) aligned with their column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    columns: Vec<(String, usize)>,
}

impl ColumnLayout {
    /// Learn the layout from a header line; `None` when fewer than two columns are found.
    pub fn from_header(header: &str) -> Option<Self> {
        let chars: Vec<char> = header.chars().collect();
        let mut columns = Vec::new();
        let mut idx = 0;
        while idx < chars.len() {
            if chars[idx] == ' ' {
                idx += 1;
                continue;
            }
            let start = idx;
            while idx < chars.len() && !(chars[idx] == ' ' && chars.get(idx + 1).map_or(true, |c| *c == ' ')) {
                idx += 1;
            }
            let name: String = chars[start..idx].iter().collect();
            columns.push((name.trim().to_string(), start));
        }
        (columns.len() >= 2).then_some(Self { columns })
    }

    /// Whether the header contains a column named `name`.
    pub fn has(&self, name: &str) -> bool {
        self.columns.iter().any(|(col, _)| col == name)
    }

    /// Slice `row` into trimmed cells keyed by column name.
    pub fn cells<'a>(&self, row: &'a str) -> Vec<(&str, &'a str)> {
        let offsets: Vec<usize> = row.char_indices().map(|(byte, _)| byte).collect();
        let byte_at = |char_idx: usize| offsets.get(char_idx).copied().unwrap_or(row.len());

        self.columns
            .iter()
            .enumerate()
            .map(|(i, (name, start))| {
                let from = byte_at(*start);
                let to = self
                    .columns
                    .get(i + 1)
                    .map_or(row.len(), |(_, next)| byte_at(*next));
                let cell = if from < to { row[from..to].trim() } else { "" };
                (name.as_str(), cell)
            })
            .collect()
    }

    /// Cell for column `name` in `row`, empty when absent.
    pub fn cell<'a>(&self, row: &'a str, name: &str) -> &'a str {
        self.cells(row)
            .into_iter()
            .find(|(col, _)| *col == name)
            .map_or("", |(_, cell)| cell)
    }
}

/// First non-empty trimmed line of `text`.
pub fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}
