//! Document domain model.

use crate::error::{CairnError, Result};
use serde::{Deserialize, Serialize};

/// Whether a document persists across sessions or is tied to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentScope {
    /// Survives session deletion; visible across sessions.
    Permanent,
    /// Owned by one session; deleted when that session is deleted.
    Temporary,
}

/// An uploaded document tracked by the document registry.
///
/// Invariant: `session_id` is present exactly when `scope` is `Temporary`.
/// A permanent document is never touched by a session-deletion cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Server-assigned document identifier.
    pub id: String,
    /// Display name (usually the uploaded file name).
    pub name: String,
    /// Size in bytes, for display.
    pub size_bytes: u64,
    /// Persistence scope.
    pub scope: DocumentScope,
    /// Owning session, present only for temporary documents.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Timestamp when the document was uploaded (ISO 8601 format).
    pub uploaded_at: String,
    /// Optional retrieval URL provided by the backend.
    #[serde(default)]
    pub url: Option<String>,
}

impl Document {
    /// Checks the scope/owner pairing invariant.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error when a temporary document lacks an
    /// owning session or a permanent document carries one.
    pub fn validate_scope(&self) -> Result<()> {
        match (self.scope, &self.session_id) {
            (DocumentScope::Temporary, None) => Err(CairnError::validation(
                "temporary document requires an owning session",
            )),
            (DocumentScope::Permanent, Some(_)) => Err(CairnError::validation(
                "permanent document must not have an owning session",
            )),
            _ => Ok(()),
        }
    }
}
