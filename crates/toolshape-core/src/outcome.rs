//! Success/failure status carried by every structured result.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::classify::Classifier;
use crate::raw::RawInvocation;

/// A closed, per-domain set of failure categories.
///
/// Every taxonomy has an `unknown` member used when no classifier rule matches.
pub trait ErrorKind: Copy + Eq + std::fmt::Debug + Serialize + Send + Sync + 'static {
    /// The fallback kind.
    const UNKNOWN: Self;

    /// Stable kebab-case name, identical to the serialized form.
    fn as_str(&self) -> &'static str;
}

/// Whether a parsed invocation succeeded, and why not if it failed.
///
/// A failure always carries a kind, so `success = false` without an error type
/// cannot be constructed. Serializes as `success`, `errorType`, `errorMessage`
/// and is meant to be flattened into a result struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<K> {
    Succeeded,
    Failed { kind: K, message: String },
}

impl<K: ErrorKind> Outcome<K> {
    /// Build a failure of the given kind.
    pub fn failed(kind: K, message: impl Into<String>) -> Self {
        Outcome::Failed {
            kind,
            message: message.into(),
        }
    }

    /// Derive the outcome of a raw invocation from its exit status.
    ///
    /// Non-zero exits and timeouts are classified against `stdout + stderr`.
    pub fn from_invocation(raw: &RawInvocation, classifier: &Classifier<K>) -> Self {
        if raw.succeeded() {
            Outcome::Succeeded
        } else {
            Self::classified(raw, classifier)
        }
    }

    /// Unconditionally classify the invocation as a failure.
    pub fn classified(raw: &RawInvocation, classifier: &Classifier<K>) -> Self {
        Outcome::Failed {
            kind: classifier.classify(&raw.combined()),
            message: raw.failure_message(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }

    pub fn kind(&self) -> Option<K> {
        match self {
            Outcome::Succeeded => None,
            Outcome::Failed { kind, .. } => Some(*kind),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Succeeded => None,
            Outcome::Failed { message, .. } => Some(message),
        }
    }

    /// One-line status used by text renderings.
    pub fn headline(&self) -> String {
        match self {
            Outcome::Succeeded => "ok".to_string(),
            Outcome::Failed { kind, message } => {
                let first = message.lines().next().unwrap_or_default();
                if first.is_empty() {
                    format!("failed ({})", kind.as_str())
                } else {
                    format!("failed ({}): {}", kind.as_str(), first)
                }
            }
        }
    }
}

impl<K: ErrorKind> Serialize for Outcome<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Outcome::Succeeded => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("success", &true)?;
                map.end()
            }
            Outcome::Failed { kind, message } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("errorType", kind)?;
                map.serialize_entry("errorMessage", message)?;
                map.end()
            }
        }
    }
}

/// Declare a domain error taxonomy.
///
/// Generates the enum with kebab-case serde names, `ErrorKind`, and `Display`.
#[macro_export]
macro_rules! error_kinds {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
        $vis enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant, )+
        }

        impl $crate::outcome::ErrorKind for $name {
            const UNKNOWN: Self = $name::Unknown;

            fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text, )+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::outcome::ErrorKind::as_str(self))
            }
        }
    };
}
