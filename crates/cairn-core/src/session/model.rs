//! Session domain model.
//!
//! This module contains the core Session entity that represents
//! one ongoing conversation in the engine's domain layer.

use super::message::{Message, MessageState};
use serde::{Deserialize, Serialize};

/// Maximum number of characters of the first user message used as a title.
const TITLE_MAX_CHARS: usize = 48;

/// Represents one ongoing conversation.
///
/// A session contains:
/// - The ordered transcript of messages (strictly append-ordered by the
///   time their governing operation was accepted)
/// - The ids of temporary documents currently in scope
/// - Timestamps for creation and last update
///
/// This is the "pure" domain model that the engine operates on,
/// independent of any specific storage format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (UUID format)
    pub id: String,
    /// Human-readable session title, derived from the first user message
    pub title: String,
    /// Timestamp when the session was created (ISO 8601 format)
    pub created_at: String,
    /// Timestamp when the session was last updated (ISO 8601 format)
    pub updated_at: String,
    /// Ordered transcript of messages
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Ids of temporary documents scoped to this session
    #[serde(default)]
    pub document_ids: Vec<String>,
}

impl Session {
    /// Creates an empty session with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: id.into(),
            title: "New conversation".to_string(),
            created_at: now.clone(),
            updated_at: now,
            messages: Vec::new(),
            document_ids: Vec::new(),
        }
    }

    /// Appends a message to the transcript and bumps `updated_at`.
    ///
    /// The transcript grows monotonically; messages are never removed or
    /// reordered by this operation.
    pub fn push_message(&mut self, message: Message) {
        // First user message names the conversation.
        if self.messages.is_empty() && !message.body.trim().is_empty() {
            self.title = truncate_title(&message.body);
        }
        self.messages.push(message);
        self.touch();
    }

    /// Returns a mutable reference to the message with the given id.
    pub fn message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// Returns the message with the given id.
    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Returns true while an assistant message in this transcript is still
    /// streaming.
    pub fn has_streaming_message(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.state == MessageState::Streaming)
    }

    /// Records a temporary document as in scope for this session.
    pub fn add_document(&mut self, document_id: impl Into<String>) {
        let document_id = document_id.into();
        if !self.document_ids.contains(&document_id) {
            self.document_ids.push(document_id);
        }
        self.touch();
    }

    /// Drops a document id from this session's scope.
    pub fn remove_document(&mut self, document_id: &str) {
        self.document_ids.retain(|id| id != document_id);
        self.touch();
    }

    /// Updates `updated_at` to the current time.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

fn truncate_title(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head.trim_end())
    }
}
