//! Candidate note model.
//!
//! # Responsibility
//! - Define the in-memory record a note store submits for validation.
//! - Provide constructors for generated and caller-provided ids.
//!
//! # Invariants
//! - `id` is caller-assigned and must not encode a filesystem path; the
//!   validator enforces this, constructors do not.
//! - `created_at`/`updated_at` are not subject to content validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Note record awaiting validation before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateNote {
    /// Caller-assigned identifier.
    pub id: String,
    /// Short human text.
    pub title: String,
    /// Arbitrary-length markdown body.
    pub body: String,
    /// Tag list; order and uniqueness are not enforced here.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional nested metadata, subject to depth/size limits only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub updated_at: i64,
}

impl CandidateNote {
    /// Creates a candidate with a generated UUID v4 id.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, body)
    }

    /// Creates a candidate with a caller-provided id.
    ///
    /// Both timestamps are set to the current time.
    pub fn with_id(
        id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let now = now_epoch_ms();
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            tags: Vec::new(),
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the tag list.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Attaches nested metadata.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Current time in Unix epoch milliseconds; `0` if the clock is before 1970.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::CandidateNote;
    use serde_json::json;

    #[test]
    fn new_generates_uuid_id() {
        let note = CandidateNote::new("title", "body");
        assert!(uuid::Uuid::parse_str(&note.id).is_ok());
        assert!(note.tags.is_empty());
        assert!(note.metadata.is_none());
        assert_eq!(note.created_at, note.updated_at);
    }

    #[test]
    fn deserialize_fills_optional_fields() {
        let note: CandidateNote = serde_json::from_value(json!({
            "id": "n1",
            "title": "t",
            "body": "b"
        }))
        .expect("minimal note should deserialize");
        assert_eq!(note.id, "n1");
        assert!(note.tags.is_empty());
        assert_eq!(note.created_at, 0);
    }

    #[test]
    fn builders_set_tags_and_metadata() {
        let note = CandidateNote::with_id("n2", "t", "b")
            .with_tags(["work", "home"])
            .with_metadata(json!({ "pinned": true }));
        assert_eq!(note.tags, vec!["work".to_string(), "home".to_string()]);
        assert_eq!(note.metadata, Some(json!({ "pinned": true })));
    }
}
