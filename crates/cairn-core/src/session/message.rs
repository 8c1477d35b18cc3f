//! Transcript message types.
//!
//! This module contains types for representing messages in a session
//! transcript, including roles, citation sources, and completion state.

use serde::{Deserialize, Serialize};

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
}

/// Completion state of a message.
///
/// A message's body and sources are append-only while `Streaming`; once it
/// reaches a terminal state it is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    /// Tokens are still arriving for this message.
    Streaming,
    /// The stream finished normally.
    Complete,
    /// The stream was aborted; accumulated text is preserved.
    Failed,
}

impl MessageState {
    /// Returns true for `Complete` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// A reference to a retrieved passage cited by an assistant message.
///
/// Field names follow the backend wire format. Sources are immutable once
/// attached to a message; duplicates are preserved since a passage may
/// legitimately be cited twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// The cited document's identifier.
    pub doc_id: String,
    /// Page number within the document.
    pub page: u32,
    /// Chunk index within the page.
    pub chunk_id: u32,
    /// Excerpted passage text.
    pub text: String,
}

/// A single message in a session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier (UUID format).
    pub id: String,
    /// The role of the message sender.
    pub role: MessageRole,
    /// The message body text.
    pub body: String,
    /// Citation sources, in arrival order.
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Ids of forms the assistant attached to this message.
    ///
    /// The forms themselves are owned by the form registry.
    #[serde(default)]
    pub form_ids: Vec<String>,
    /// Completion state.
    pub state: MessageState,
    /// Timestamp when the message was created (ISO 8601 format).
    pub created_at: String,
}

impl Message {
    /// Creates a user message. User messages are complete on creation.
    pub fn user(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: MessageRole::User,
            body: body.into(),
            sources: Vec::new(),
            form_ids: Vec::new(),
            state: MessageState::Complete,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Creates an empty assistant placeholder in the `Streaming` state.
    ///
    /// The placeholder is appended to the transcript when a send is accepted
    /// and filled in by the stream reconciler.
    pub fn assistant_placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: MessageRole::Assistant,
            body: String::new(),
            sources: Vec::new(),
            form_ids: Vec::new(),
            state: MessageState::Streaming,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Returns true once the message has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
