//! crates/assignment_sync_core/src/domain.rs
//!
//! Defines the pure, core data structures for the sync layer.
//! These structs are independent of the websocket transport and of any UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Who authored a chat message. The wire carries this under the key `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of the assignment's chat transcript.
///
/// The `id` is unique within a transcript; the sync layer appends entries and
/// never reorders or removes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: ChatRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: ChatRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Server-produced output for an assignment, present only once generation has
/// run at least once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub content: String,
    #[serde(default)]
    pub word_count: i64,
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub generation_id: i64,
}

/// Presence flags the server sends redundantly alongside the real fields.
///
/// Advisory only: consumers that need to know whether a field exists must use
/// the derived accessors on the snapshot, not these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryFlags {
    pub has_title: Option<bool>,
    pub has_description: Option<bool>,
    pub has_generated_content: Option<bool>,
}

/// The client's cached view of one server-side assignment.
///
/// Created empty, populated incrementally by fetch/update responses, and
/// discarded with the owning view. Never persisted; a restart refetches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssignmentSnapshot {
    pub assignment_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub assignment_type: Option<String>,
    pub subject: Option<String>,
    pub word_count: Option<i64>,
    pub generated_content: Option<GeneratedContent>,
    pub advisory: AdvisoryFlags,
    pub chat_messages: Vec<ChatMessage>,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Server payload keys this client does not enumerate, kept opaquely.
    pub extra: BTreeMap<String, Value>,
}

impl AssignmentSnapshot {
    /// Derived presence check; ignores the advisory flag from the server.
    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn has_description(&self) -> bool {
        self.description.as_deref().is_some_and(|d| !d.is_empty())
    }

    pub fn has_generated_content(&self) -> bool {
        self.generated_content.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_presence_ignores_advisory_flags() {
        let mut snapshot = AssignmentSnapshot::default();
        snapshot.advisory.has_title = Some(true);
        assert!(!snapshot.has_title());

        snapshot.title = Some("Essay".to_string());
        assert!(snapshot.has_title());

        // Empty string is "known but empty", which is still not a title.
        snapshot.title = Some(String::new());
        assert!(!snapshot.has_title());
    }

    #[test]
    fn chat_role_uses_wire_casing() {
        let msg = ChatMessage {
            id: "m1".to_string(),
            role: ChatRole::Assistant,
            content: "hello".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "assistant");
    }
}
