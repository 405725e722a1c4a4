use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CortexError, CortexResult};

/// A single imported text unit.
///
/// `content_hash` is unique among non-deleted rows; deleted memories retain
/// their content but are excluded from retrieval/listing by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub content: String,
    pub source_file: String,
    pub source_line: Option<i64>,
    pub source_section: Option<String>,
    pub content_hash: String,
    /// `""` = untagged.
    pub project: String,
    /// One of [`MemoryClass`]'s six labels, or `""` (the default sentinel).
    pub memory_class: String,
    /// Opaque JSON string holding the metadata shape. `None` ⇒ stored as SQL NULL.
    pub metadata: Option<String>,
    pub imported_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Memory {
    /// Construct a new, not-yet-persisted memory. `content_hash` is left
    /// empty and should be filled by the repository if not already set.
    pub fn new(content: impl Into<String>, source_file: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            content: content.into(),
            source_file: source_file.into(),
            source_line: None,
            source_section: None,
            content_hash: String::new(),
            project: String::new(),
            memory_class: String::new(),
            metadata: None,
            imported_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// The six enumerated memory classes, plus the `""` default sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryClass {
    Rule,
    Decision,
    Preference,
    Identity,
    Status,
    Scratch,
}

impl MemoryClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryClass::Rule => "rule",
            MemoryClass::Decision => "decision",
            MemoryClass::Preference => "preference",
            MemoryClass::Identity => "identity",
            MemoryClass::Status => "status",
            MemoryClass::Scratch => "scratch",
        }
    }

    /// Normalize (trim + lowercase) and validate against the six labels,
    /// with `""` accepted as the default sentinel.
    pub fn normalize_and_validate(raw: &str) -> CortexResult<String> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Ok(String::new());
        }
        match normalized.as_str() {
            "rule" | "decision" | "preference" | "identity" | "status" | "scratch" => {
                Ok(normalized)
            }
            other => Err(CortexError::InvalidMemoryClass(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_valid_sentinel() {
        assert_eq!(MemoryClass::normalize_and_validate("").unwrap(), "");
        assert_eq!(MemoryClass::normalize_and_validate("  ").unwrap(), "");
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(
            MemoryClass::normalize_and_validate("  Decision  ").unwrap(),
            "decision"
        );
    }

    #[test]
    fn rejects_unknown_class() {
        assert!(MemoryClass::normalize_and_validate("bogus").is_err());
    }
}
