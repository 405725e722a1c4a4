use serde::{Deserialize, Serialize};

/// Typed projection over the memory-level metadata JSON shape.
///
/// All fields optional; stored verbatim as a JSON string at the storage
/// layer. Unknown keys round-trip untouched via `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_type: Option<String>,
    /// ISO-8601 string, not a parsed timestamp — kept opaque like the rest of the shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_end: Option<String>,

    /// Any keys not in the well-known set above, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MemoryMetadata {
    /// Parse a stored metadata JSON string. `None` input (SQL NULL) yields `None`.
    pub fn parse(raw: Option<&str>) -> Result<Option<Self>, serde_json::Error> {
        match raw {
            None => Ok(None),
            Some(s) => Ok(Some(serde_json::from_str(s)?)),
        }
    }

    /// Serialize for storage. Returns `None` when there is nothing to store,
    /// so the caller writes SQL NULL rather than the literal string `"null"`
    ///.
    pub fn to_stored(&self) -> Result<Option<String>, serde_json::Error> {
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::to_string(self)?))
    }

    fn is_empty(&self) -> bool {
        self.session_key.is_none()
            && self.channel.is_none()
            && self.channel_id.is_none()
            && self.channel_name.is_none()
            && self.agent_id.is_none()
            && self.agent_name.is_none()
            && self.model.is_none()
            && self.input_tokens.is_none()
            && self.output_tokens.is_none()
            && self.message_count.is_none()
            && self.surface.is_none()
            && self.chat_type.is_none()
            && self.timestamp_start.is_none()
            && self.timestamp_end.is_none()
            && self.extra.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_input_yields_none() {
        assert!(MemoryMetadata::parse(None).unwrap().is_none());
    }

    #[test]
    fn unknown_keys_round_trip() {
        let raw = r#"{"agent_id":"a1","some_future_field":42}"#;
        let meta = MemoryMetadata::parse(Some(raw)).unwrap().unwrap();
        assert_eq!(meta.agent_id.as_deref(), Some("a1"));
        assert_eq!(meta.extra.get("some_future_field").unwrap(), 42);

        let stored = meta.to_stored().unwrap().unwrap();
        let reparsed = MemoryMetadata::parse(Some(&stored)).unwrap().unwrap();
        assert_eq!(reparsed.extra.get("some_future_field").unwrap(), 42);
    }

    #[test]
    fn empty_metadata_stores_as_none_not_null_string() {
        let meta = MemoryMetadata::default();
        assert_eq!(meta.to_stored().unwrap(), None);
    }
}
