//! Ordered, first-match-wins error classification.
//!
//! Each domain declares one [`Classifier`] as a static table of
//! `(pattern, kind)` rules. Rules are evaluated top to bottom against the
//! combined `stdout + stderr` text; when several patterns overlap the earlier
//! rule wins, so more specific messages must be listed first.

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::outcome::ErrorKind;

/// How a rule recognises its message.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Case-insensitive substring.
    Contains(String),
    /// Case-insensitive regular expression.
    Pattern(Regex),
}

impl Matcher {
    fn is_match(&self, haystack: &str, lowered: &str) -> bool {
        match self {
            Matcher::Contains(needle) => lowered.contains(needle.as_str()),
            Matcher::Pattern(re) => re.is_match(haystack),
        }
    }

    fn describe(&self) -> &str {
        match self {
            Matcher::Contains(needle) => needle,
            Matcher::Pattern(re) => re.as_str(),
        }
    }
}

/// A single classification rule.
#[derive(Debug, Clone)]
pub struct Rule<K> {
    pub matcher: Matcher,
    pub kind: K,
}

/// An ordered rule table for one domain's error taxonomy.
#[derive(Debug, Clone)]
pub struct Classifier<K> {
    rules: Vec<Rule<K>>,
}

impl<K: ErrorKind> Default for Classifier<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ErrorKind> Classifier<K> {
    /// An empty table; everything classifies as `unknown`.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a case-insensitive substring rule.
    pub fn contains(mut self, needle: &str, kind: K) -> Self {
        self.rules.push(Rule {
            matcher: Matcher::Contains(needle.to_lowercase()),
            kind,
        });
        self
    }

    /// Append a case-insensitive regex rule.
    ///
    /// An invalid pattern is logged and skipped rather than poisoning the table.
    pub fn pattern(mut self, pattern: &str, kind: K) -> Self {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => self.rules.push(Rule {
                matcher: Matcher::Pattern(re),
                kind,
            }),
            Err(err) => warn!(pattern, %err, "skipping invalid classifier pattern"),
        }
        self
    }

    /// Classify `text`; the first matching rule wins, no match yields `unknown`.
    pub fn classify(&self, text: &str) -> K {
        let lowered = text.to_lowercase();
        for rule in &self.rules {
            if rule.matcher.is_match(text, &lowered) {
                debug!(
                    kind = rule.kind.as_str(),
                    rule = rule.matcher.describe(),
                    "classified failure"
                );
                return rule.kind;
            }
        }
        K::UNKNOWN
    }

    /// Rules in evaluation order, for auditing priority.
    pub fn rules(&self) -> &[Rule<K>] {
        &self.rules
    }
}
