//! Temporary identifiers
//!
//! ID Format: `aw_{12-char-hex}` (e.g., `aw_0a1b2c3d4e5f`)
//!
//! Agents use temporary IDs as placeholders for entities that do not exist
//! yet. A message declares the ID it will provide, and other messages in the
//! same batch refer to it either by the bare ID or by a `#`-prefixed
//! reference (`#aw_0a1b2c3d4e5f`), including inside free text.
//!
//! Canonical form is lowercase without the leading `#`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix shared by every temporary ID
pub const TEMPORARY_ID_PREFIX: &str = "aw_";

/// Number of hex digits after the prefix
const HASH_LEN: usize = 12;

/// Matches `#aw_{12-hex}` tokens embedded in text
static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)#(aw_[0-9a-f]{12})\b").expect("reference pattern is valid")
});

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("invalid temporary_id: expected 'aw_{{12-char-hex}}', got '{0}'")]
    Malformed(String),

    #[error("invalid temporary_id: expected a string, got {0}")]
    NotAString(String),
}

/// Generates a 12-character hash from a seed and timestamp
fn generate_hash(seed: &str, timestamp: DateTime<Utc>) -> String {
    let input = format!("{}{}", seed, timestamp.timestamp_nanos_opt().unwrap_or(0));
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..HASH_LEN].to_string()
}

/// A canonical temporary ID (`aw_` + 12 lowercase hex digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TemporaryId {
    hash: String,
}

impl TemporaryId {
    /// Creates a new temporary ID from a seed and timestamp
    pub fn generate(seed: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            hash: generate_hash(seed, timestamp),
        }
    }

    /// Normalizes a raw value into a canonical ID
    ///
    /// Trims whitespace, strips one leading `#`, and lowercases. Returns
    /// `None` when the result does not have the canonical shape.
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let unprefixed = trimmed.strip_prefix('#').unwrap_or(trimmed);
        let lowered = unprefixed.to_ascii_lowercase();

        let hash = lowered.strip_prefix(TEMPORARY_ID_PREFIX)?;
        if hash.len() != HASH_LEN || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        Some(Self {
            hash: hash.to_string(),
        })
    }

    /// Returns true if the raw value looks like a temporary ID reference
    pub fn is_temporary_id(raw: &str) -> bool {
        Self::normalize(raw).is_some()
    }

    /// Returns the hex portion of the ID
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Returns the `#`-prefixed reference form used in text
    pub fn as_reference(&self) -> String {
        format!("#{}", self)
    }
}

impl fmt::Display for TemporaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", TEMPORARY_ID_PREFIX, self.hash)
    }
}

impl FromStr for TemporaryId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s).ok_or_else(|| IdError::Malformed(s.to_string()))
    }
}

impl TryFrom<String> for TemporaryId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TemporaryId> for String {
    fn from(id: TemporaryId) -> Self {
        id.to_string()
    }
}

/// Finds every `#aw_...` reference embedded in text, in order of appearance
pub fn scan_text_references(text: &str) -> Vec<TemporaryId> {
    REFERENCE_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| TemporaryId::normalize(m.as_str()))
        .collect()
}

/// Replaces each `#aw_...` reference in text using the given lookup
///
/// References for which `replace` returns `None` are left untouched.
pub fn replace_text_references<F>(text: &str, mut replace: F) -> String
where
    F: FnMut(&TemporaryId) -> Option<String>,
{
    REFERENCE_PATTERN
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let original = caps[0].to_string();
            match TemporaryId::normalize(&caps[1]) {
                Some(id) => replace(&id).unwrap_or(original),
                None => original,
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalize_strips_hash_and_lowercases() {
        let id = TemporaryId::normalize("  #AW_0A1B2C3D4E5F ").unwrap();
        assert_eq!(id.to_string(), "aw_0a1b2c3d4e5f");
        assert_eq!(id.hash(), "0a1b2c3d4e5f");
    }

    #[test]
    fn normalize_rejects_invalid_shapes() {
        assert!(TemporaryId::normalize("not-a-valid-id").is_none());
        assert!(TemporaryId::normalize("aw_short").is_none());
        assert!(TemporaryId::normalize("aw_0a1b2c3d4e5f0").is_none()); // too long
        assert!(TemporaryId::normalize("aw_0a1b2c3d4e5g").is_none()); // 'g' is not hex
        assert!(TemporaryId::normalize("##aw_0a1b2c3d4e5f").is_none()); // only one '#' stripped
        assert!(TemporaryId::normalize("").is_none());
    }

    #[test]
    fn generated_id_is_canonical() {
        let id = TemporaryId::generate("Fix login", Utc::now());
        let s = id.to_string();

        assert!(s.starts_with("aw_"));
        assert_eq!(s.len(), 15);
        assert_eq!(TemporaryId::normalize(&s), Some(id));
    }

    #[test]
    fn generation_is_unique_for_different_timestamps() {
        let ts1 = Utc::now();
        let ts2 = ts1 + chrono::Duration::nanoseconds(1);

        assert_ne!(
            TemporaryId::generate("Same", ts1),
            TemporaryId::generate("Same", ts2)
        );
    }

    #[test]
    fn parse_reports_malformed_value() {
        let err = "aw_xyz".parse::<TemporaryId>().unwrap_err();
        assert_eq!(err, IdError::Malformed("aw_xyz".to_string()));
        assert!(err.to_string().contains("invalid temporary_id"));
    }

    #[test]
    fn serde_uses_canonical_string() {
        let id: TemporaryId = serde_json::from_str("\"#AW_00000000abcd\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"aw_00000000abcd\"");
        assert!(serde_json::from_str::<TemporaryId>("\"aw_nope\"").is_err());
    }

    #[test]
    fn scans_references_in_text() {
        let text = "Follow-up to #aw_00000000000a and #AW_00000000000B, not aw_00000000000c";
        let ids: Vec<String> = scan_text_references(text)
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(ids, vec!["aw_00000000000a", "aw_00000000000b"]);
    }

    #[test]
    fn scan_ignores_longer_tokens() {
        assert!(scan_text_references("#aw_00000000000a1").is_empty());
    }

    #[test]
    fn replaces_known_references_only() {
        let text = "See #aw_00000000000a and #aw_00000000000b.";
        let out = replace_text_references(text, |id| {
            (id.hash() == "00000000000a").then(|| "#42".to_string())
        });

        assert_eq!(out, "See #42 and #aw_00000000000b.");
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(hash in "[0-9a-fA-F]{12}", hashed in any::<bool>()) {
            let raw = if hashed { format!("#aw_{hash}") } else { format!("AW_{hash}") };
            let once = TemporaryId::normalize(&raw).unwrap();
            let twice = TemporaryId::normalize(&once.to_string()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
