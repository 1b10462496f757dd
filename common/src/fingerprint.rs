//! # Fingerprint Model
//!
//! A [`Fingerprint`] is a single identity signal contributed by one probe, such as a
//! reverse DNS name or an SSH host-key hash. Probes push their findings into a
//! [`FingerprintSet`], which deduplicates them and exposes a stable `(kind, value)`
//! ordering for output.

use std::collections::BTreeSet;
use std::fmt;

/// An immutable `(kind, value)` pair.
///
/// Field order matters: the derived ordering compares `kind` first, then `value`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint {
    kind: String,
    value: String,
}

impl Fingerprint {
    /// Builds a fingerprint with a normalized `kind`.
    ///
    /// Returns `None` for an empty `value`; probes that found nothing contribute nothing.
    pub fn new(kind: &str, value: impl Into<String>) -> Option<Self> {
        let value: String = value.into();
        if value.is_empty() {
            return None;
        }
        Some(Self {
            kind: normalize_kind(kind),
            value,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.value)
    }
}

/// Replaces every character that is not a word character or `+` with `_`, then lowercases.
pub fn normalize_kind(kind: &str) -> String {
    kind.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '+' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .to_lowercase()
}

/// Deduplicated collection of fingerprints for one target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FingerprintSet {
    entries: BTreeSet<Fingerprint>,
}

impl FingerprintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `(kind, value)` pair.
    ///
    /// Returns `true` only when the pair was not already present. Empty values are ignored.
    pub fn add(&mut self, kind: &str, value: impl Into<String>) -> bool {
        match Fingerprint::new(kind, value) {
            Some(fingerprint) => self.entries.insert(fingerprint),
            None => false,
        }
    }

    /// `kind` is normalized the same way as on insertion.
    pub fn contains(&self, kind: &str, value: &str) -> bool {
        Fingerprint::new(kind, value).is_some_and(|fingerprint| self.entries.contains(&fingerprint))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates in `(kind, value)` order.
    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.entries.iter()
    }

    pub fn into_sorted_vec(self) -> Vec<Fingerprint> {
        self.entries.into_iter().collect()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
