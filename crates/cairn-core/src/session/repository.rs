//! Session repository trait.
//!
//! Defines the interface for archiving sessions, decoupling the engine
//! from the specific storage mechanism (TOML files, database, remote API).

use super::model::Session;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract repository for session persistence.
///
/// Archival is best-effort from the engine's point of view: a failing
/// repository never blocks a conversation, it only loses the archive copy.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: Session found
    /// - `Ok(None)`: Session not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Saves a session to storage, replacing any previous copy.
    async fn save(&self, session: &Session) -> Result<()>;

    /// Deletes a session from storage.
    ///
    /// Deleting an absent session is a no-op, not an error.
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Lists all stored sessions, ordered by creation time ascending.
    async fn list_all(&self) -> Result<Vec<Session>>;
}
