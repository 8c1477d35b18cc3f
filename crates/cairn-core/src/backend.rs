//! Backend boundary trait.
//!
//! The reasoning/retrieval backend is a black box reachable only through
//! this interface. The trait lives in the core crate so the engine can be
//! driven by any implementation (the HTTP client in `cairn-interaction`,
//! mocks in tests) without a circular dependency.

use crate::document::{Document, DocumentScope};
use crate::error::Result;
use crate::session::StreamEvent;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// The backend service consumed by the session engine.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Opens the streaming chat endpoint for one assistant turn.
    ///
    /// The returned channel yields events in emission order and closes
    /// after the terminal `Done`/`Error` event. A channel that closes
    /// without a terminal event is treated as a transport failure.
    ///
    /// # Errors
    ///
    /// Returns a `Transport` error if the stream cannot be opened.
    async fn stream_chat(
        &self,
        session_id: &str,
        user: &str,
        text: &str,
    ) -> Result<mpsc::Receiver<StreamEvent>>;

    /// Uploads a document and returns the registered descriptor.
    ///
    /// `session_id` must be present exactly when `scope` is `Temporary`.
    /// On failure nothing is registered server-side.
    ///
    /// # Errors
    ///
    /// Returns a `Transport` error on network failure or backend rejection.
    async fn upload_document(
        &self,
        scope: DocumentScope,
        session_id: Option<&str>,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Document>;

    /// Forwards a form submission to the backend.
    ///
    /// # Errors
    ///
    /// Returns a `Transport` error on network failure or backend rejection;
    /// the caller leaves the form `Pending` so the user may retry.
    async fn submit_form(&self, form_id: &str, values: &Map<String, Value>) -> Result<()>;

    /// Liveness probe, used only to label connectivity state.
    async fn health(&self) -> bool;
}
