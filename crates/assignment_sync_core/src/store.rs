//! crates/assignment_sync_core/src/store.rs
//!
//! The assignment state store: holds the current [`AssignmentSnapshot`] and
//! provides controlled mutation. Constructed explicitly and passed to the
//! flows that need it; reads are synchronous and always reflect the latest
//! completed mutation. Loading/pending UI state is the caller's concern, not
//! the store's.

use crate::domain::{AssignmentSnapshot, ChatMessage, ChatRole, GeneratedContent};
use chrono::Utc;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub struct AssignmentStore {
    inner: Mutex<AssignmentSnapshot>,
}

impl AssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AssignmentSnapshot> {
        // Mutations are plain field writes; a poisoned lock still holds a
        // coherent snapshot.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the current snapshot.
    pub fn snapshot(&self) -> AssignmentSnapshot {
        self.lock().clone()
    }

    /// Clears the snapshot back to its empty initial form.
    pub fn reset(&self) {
        *self.lock() = AssignmentSnapshot::default();
    }

    /// Records the time of a successful fetch.
    pub fn mark_synced(&self) {
        self.lock().last_synced_at = Some(Utc::now());
    }

    /// Sets the assignment id if it is not already set. A conflicting later
    /// id is ignored: a new assignment requires a fresh snapshot, never an
    /// in-place id change.
    pub fn set_assignment_id(&self, id: i64) {
        let mut snapshot = self.lock();
        if snapshot.assignment_id.is_none() {
            snapshot.assignment_id = Some(id);
        }
    }

    /// Applies one top-level field from a server payload.
    ///
    /// Known keys land in their typed slots; unknown keys are kept opaquely
    /// in `extra` since the server payload shape is a superset this client
    /// does not enumerate. A `null` value records "known to be absent",
    /// distinct from an untouched field. Malformed nested payloads leave the
    /// prior value in place.
    pub fn replace_field(&self, key: &str, value: &Value) {
        let mut snapshot = self.lock();
        match key {
            "id" | "assignment_id" => {
                if let Some(id) = value.as_i64() {
                    if snapshot.assignment_id.is_none() {
                        snapshot.assignment_id = Some(id);
                    }
                }
            }
            "title" => apply_opt_string(&mut snapshot.title, value),
            "description" => apply_opt_string(&mut snapshot.description, value),
            "status" => apply_opt_string(&mut snapshot.status, value),
            "assignment_type" => apply_opt_string(&mut snapshot.assignment_type, value),
            "subject" => apply_opt_string(&mut snapshot.subject, value),
            "word_count" => match value {
                Value::Null => snapshot.word_count = None,
                other => {
                    if let Some(n) = other.as_i64() {
                        snapshot.word_count = Some(n);
                    }
                }
            },
            "generated_content" => match value {
                Value::Null => snapshot.generated_content = None,
                other => {
                    if let Ok(content) = serde_json::from_value::<GeneratedContent>(other.clone()) {
                        snapshot.generated_content = Some(content);
                    }
                }
            },
            "has_title" => snapshot.advisory.has_title = value.as_bool(),
            "has_description" => snapshot.advisory.has_description = value.as_bool(),
            "has_generated_content" => snapshot.advisory.has_generated_content = value.as_bool(),
            "chat_messages" => {
                if let Ok(messages) = serde_json::from_value::<Vec<ChatMessage>>(value.clone()) {
                    snapshot.chat_messages = dedup_by_id(messages);
                }
            }
            _ => {
                snapshot.extra.insert(key.to_string(), value.clone());
            }
        }
    }

    /// Replaces the whole transcript. Used for full-state fetch responses,
    /// which carry the authoritative sequence rather than an increment.
    pub fn replace_chat_messages(&self, messages: Vec<ChatMessage>) {
        self.lock().chat_messages = dedup_by_id(messages);
    }

    /// Appends one message. A duplicate id (e.g. re-delivery of the same
    /// response) is a no-op, so the transcript never shows the same entry
    /// twice. Returns whether the message was inserted.
    pub fn append_chat_message(&self, message: ChatMessage) -> bool {
        let mut snapshot = self.lock();
        if snapshot.chat_messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        snapshot.chat_messages.push(message);
        true
    }

    /// Inserts the synthetic welcome message for a context key at most once.
    ///
    /// The id is deterministic per context, so re-renders and repeated mounts
    /// cannot produce duplicate welcome entries. Returns whether the message
    /// was inserted.
    pub fn ensure_welcome_message(&self, context_key: &str, content: &str) -> bool {
        self.append_chat_message(ChatMessage {
            id: format!("welcome-{context_key}"),
            role: ChatRole::Assistant,
            content: content.to_string(),
            timestamp: Utc::now(),
        })
    }
}

fn apply_opt_string(slot: &mut Option<String>, value: &Value) {
    match value {
        Value::Null => *slot = None,
        Value::String(s) => *slot = Some(s.clone()),
        _ => {}
    }
}

fn dedup_by_id(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut seen = std::collections::HashSet::new();
    messages
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(id: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            role: ChatRole::Assistant,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn fetch_response_replaces_transcript_instead_of_appending() {
        let store = AssignmentStore::new();
        store.append_chat_message(message("a", "first"));
        store.append_chat_message(message("b", "second"));

        store.replace_field(
            "chat_messages",
            &json!([{
                "id": "x",
                "type": "user",
                "content": "only one",
                "timestamp": "2026-01-05T10:00:00Z"
            }]),
        );

        let snapshot = store.snapshot();
        assert_eq!(snapshot.chat_messages.len(), 1);
        assert_eq!(snapshot.chat_messages[0].id, "x");
    }

    #[test]
    fn duplicate_message_ids_are_not_appended() {
        let store = AssignmentStore::new();
        assert!(store.append_chat_message(message("m1", "hello")));
        assert!(!store.append_chat_message(message("m1", "hello again")));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.chat_messages.len(), 1);
        assert_eq!(snapshot.chat_messages[0].content, "hello");
    }

    #[test]
    fn welcome_message_inserted_once_per_context() {
        let store = AssignmentStore::new();
        assert!(store.ensure_welcome_message("artifact-7", "Welcome!"));
        assert!(!store.ensure_welcome_message("artifact-7", "Welcome!"));

        let snapshot = store.snapshot();
        let welcomes: Vec<_> = snapshot
            .chat_messages
            .iter()
            .filter(|m| m.id == "welcome-artifact-7")
            .collect();
        assert_eq!(welcomes.len(), 1);

        // A different context gets its own entry.
        assert!(store.ensure_welcome_message("artifact-8", "Welcome!"));
    }

    #[test]
    fn assignment_id_is_set_at_most_once() {
        let store = AssignmentStore::new();
        store.replace_field("id", &json!(42));
        store.replace_field("id", &json!(99));
        assert_eq!(store.snapshot().assignment_id, Some(42));
    }

    #[test]
    fn null_means_known_absent_not_untouched() {
        let store = AssignmentStore::new();
        store.replace_field("title", &json!("Essay"));
        store.replace_field("description", &json!(null));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.title.as_deref(), Some("Essay"));
        assert_eq!(snapshot.description, None);
        assert!(!snapshot.has_description());
    }

    #[test]
    fn unknown_keys_are_kept_opaquely() {
        let store = AssignmentStore::new();
        store.replace_field("grading_rubric", &json!({"strict": true}));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.extra["grading_rubric"], json!({"strict": true}));
    }

    #[test]
    fn advisory_flags_do_not_override_derived_checks() {
        let store = AssignmentStore::new();
        store.replace_field("title", &json!("Essay"));
        store.replace_field("has_title", &json!(false));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.advisory.has_title, Some(false));
        assert!(snapshot.has_title());
    }

    #[test]
    fn reset_returns_to_the_empty_form() {
        let store = AssignmentStore::new();
        store.replace_field("id", &json!(7));
        store.append_chat_message(message("m1", "hi"));
        store.reset();
        assert_eq!(store.snapshot(), AssignmentSnapshot::default());
    }
}
