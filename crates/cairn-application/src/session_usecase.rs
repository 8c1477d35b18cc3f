//! Session use case implementation.
//!
//! This module provides the `SessionUseCase` which wires the session
//! engine, the shared document and form registries, the backend client,
//! and the optional session archive together, and exposes the entry
//! points a presentation layer calls. Every read returns a cloned
//! snapshot, so callers never hold engine locks across renders.

use cairn_core::backend::ChatBackend;
use cairn_core::document::{Document, DocumentRegistry, DocumentScope};
use cairn_core::error::{CairnError, Result};
use cairn_core::form::{Form, FormRegistry};
use cairn_core::session::{Message, Session, SessionEngine, SessionRepository};
use cairn_interaction::{BackendConfig, HttpBackend};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Use case for driving conversations against the backend.
///
/// # Responsibilities
///
/// - Session lifecycle (create, restore from archive, delete with the
///   temporary-document cascade)
/// - Sending messages and streaming assistant turns
/// - Document upload/delete/listing with scope validation
/// - Form submission with required-field validation
/// - Best-effort archival after every transcript mutation
///
/// # Thread Safety
///
/// All internal components are wrapped in `Arc` and use interior
/// mutability for thread-safe concurrent access; per-session transitions
/// stay serial inside the engine.
pub struct SessionUseCase {
    /// The session engine (transcripts, streams, turn orchestration)
    engine: Arc<SessionEngine>,
    /// Shared document registry
    documents: Arc<DocumentRegistry>,
    /// Shared form registry
    forms: Arc<FormRegistry>,
    /// Backend service client
    backend: Arc<dyn ChatBackend>,
    /// Optional session archive; failures here are logged, never fatal
    archive: Option<Arc<dyn SessionRepository>>,
}

impl SessionUseCase {
    /// Creates a new `SessionUseCase`.
    ///
    /// # Arguments
    ///
    /// * `backend` - The backend service client
    /// * `archive` - Optional session archive for persistence across runs
    /// * `user` - Pre-established user identity forwarded to the backend
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        archive: Option<Arc<dyn SessionRepository>>,
        user: impl Into<String>,
    ) -> Self {
        let documents = Arc::new(DocumentRegistry::new());
        let forms = Arc::new(FormRegistry::new());
        let engine = Arc::new(SessionEngine::new(
            backend.clone(),
            documents.clone(),
            forms.clone(),
            user,
        ));
        Self {
            engine,
            documents,
            forms,
            backend,
            archive,
        }
    }

    /// Creates a use case talking to the configured HTTP backend.
    ///
    /// The backend settings (and the user identity forwarded with chat
    /// requests) come from `~/.config/cairn/backend.json` / environment.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if an existing configuration file cannot
    /// be read or parsed.
    pub fn try_from_env() -> Result<Self> {
        let config = BackendConfig::load()?;
        let user = config.user.clone();
        Ok(Self::new(Arc::new(HttpBackend::new(config)), None, user))
    }

    /// Attaches a session archive; mutations are persisted best-effort.
    pub fn with_archive(mut self, archive: Arc<dyn SessionRepository>) -> Self {
        self.archive = Some(archive);
        self
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Loads all archived sessions into the engine.
    ///
    /// Returns the number of sessions restored. A missing archive restores
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be listed.
    pub async fn restore_sessions(&self) -> Result<usize> {
        let Some(archive) = &self.archive else {
            return Ok(0);
        };
        let sessions = archive.list_all().await?;
        let count = sessions.len();
        for session in sessions {
            self.engine.insert_session(session).await;
        }
        tracing::info!("restored {} archived session(s)", count);
        Ok(count)
    }

    /// Creates a new session and returns its snapshot. Always succeeds.
    pub async fn create_session(&self) -> Session {
        let session = self.engine.create_session().await;
        self.archive_session(&session.id).await;
        session
    }

    /// Sends a user message and streams the assistant's reply.
    ///
    /// Returns the finalized assistant message; a backend-reported failure
    /// is represented by the message's `Failed` state, with its partial
    /// text preserved in the transcript either way.
    ///
    /// # Errors
    ///
    /// See [`SessionEngine::send_message`].
    pub async fn send_message(&self, session_id: &str, text: &str) -> Result<Message> {
        let result = self.engine.send_message(session_id, text).await;
        // Archive whatever the turn left behind, including partials.
        self.archive_session(session_id).await;
        result
    }

    /// Cancels the in-flight assistant turn for a session.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no stream is active for this session.
    pub async fn cancel_stream(&self, session_id: &str) -> Result<()> {
        self.engine.cancel_stream(session_id).await
    }

    /// Deletes a session, cascading to its temporary documents and its
    /// archive copy. Idempotent.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.engine.delete_session(session_id).await?;
        if let Some(archive) = &self.archive {
            if let Err(e) = archive.delete(session_id).await {
                tracing::warn!("failed to remove archived session '{}': {}", session_id, e);
            }
        }
        Ok(())
    }

    /// Replaces the body of a user-authored, complete message.
    ///
    /// # Errors
    ///
    /// See [`SessionEngine::edit_message`].
    pub async fn edit_message(
        &self,
        session_id: &str,
        message_id: &str,
        new_text: &str,
    ) -> Result<Message> {
        let message = self
            .engine
            .edit_message(session_id, message_id, new_text)
            .await?;
        self.archive_session(session_id).await;
        Ok(message)
    }

    /// Returns a snapshot of one session's transcript.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    pub async fn transcript(&self, session_id: &str) -> Result<Session> {
        self.engine
            .session(session_id)
            .await
            .ok_or_else(|| CairnError::not_found("Session", session_id))
    }

    /// Returns snapshots of all sessions, creation-time ascending.
    pub async fn list_sessions(&self) -> Vec<Session> {
        self.engine.list_sessions().await
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Uploads a document and registers it with the given scope.
    ///
    /// Nothing is registered when the backend rejects the upload.
    ///
    /// # Errors
    ///
    /// - `Validation` if the scope/session pairing is invalid
    /// - `NotFound` if the owning session does not exist
    /// - `Transport` if the upload fails
    pub async fn upload_document(
        &self,
        scope: DocumentScope,
        session_id: Option<&str>,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Document> {
        match (scope, session_id) {
            (DocumentScope::Temporary, None) => {
                return Err(CairnError::validation(
                    "temporary upload requires a session id",
                ));
            }
            (DocumentScope::Permanent, Some(_)) => {
                return Err(CairnError::validation(
                    "permanent upload must not carry a session id",
                ));
            }
            (DocumentScope::Temporary, Some(sid)) => {
                if !self.engine.session_exists(sid).await {
                    return Err(CairnError::not_found("Session", sid));
                }
            }
            (DocumentScope::Permanent, None) => {}
        }

        let document = self
            .backend
            .upload_document(scope, session_id, file_name, bytes)
            .await?;
        let document = self.documents.register(document).await?;
        if let (DocumentScope::Temporary, Some(sid)) = (scope, session_id) {
            if let Err(err) = self.engine.record_document(sid, &document.id).await {
                // The session vanished mid-upload; drop the orphaned registration.
                let _ = self.documents.delete(&document.id).await;
                return Err(err);
            }
            self.archive_session(sid).await;
        }
        tracing::info!(
            "uploaded document '{}' ({:?}, {} bytes)",
            document.id,
            document.scope,
            document.size_bytes
        );
        Ok(document)
    }

    /// Removes a document from the registry and, for temporary documents,
    /// from the owning session's scope.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such document exists.
    pub async fn delete_document(&self, document_id: &str) -> Result<Document> {
        let document = self.documents.delete(document_id).await?;
        if let Some(sid) = &document.session_id {
            self.engine.unrecord_document(sid, document_id).await;
            self.archive_session(sid).await;
        }
        Ok(document)
    }

    /// Lists the documents in scope for a session, upload-time ascending.
    pub async fn list_documents(
        &self,
        session_id: &str,
        include_permanent: bool,
    ) -> Vec<Document> {
        self.documents
            .list_for_session(session_id, include_permanent)
            .await
    }

    // ------------------------------------------------------------------
    // Forms
    // ------------------------------------------------------------------

    /// Submits a filled-in form to the backend.
    ///
    /// The form flips to `Submitted` only after the backend accepts the
    /// values; a backend failure leaves it `Pending` so the user may retry.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the form does not exist
    /// - `Conflict` if the form was already submitted
    /// - `Validation` if a required field is missing or blank
    /// - `Transport` if the backend rejects the submission
    pub async fn submit_form(
        &self,
        form_id: &str,
        values: Map<String, Value>,
    ) -> Result<Form> {
        self.forms.validate_submit(form_id, &values).await?;
        self.backend.submit_form(form_id, &values).await?;
        self.forms.mark_submitted(form_id, values).await
    }

    /// Returns a snapshot of one form.
    pub async fn form(&self, form_id: &str) -> Option<Form> {
        self.forms.get(form_id).await
    }

    /// Returns snapshots of the forms attached to a message.
    pub async fn forms_for_message(&self, message_id: &str) -> Vec<Form> {
        self.forms.list_for_message(message_id).await
    }

    // ------------------------------------------------------------------
    // Connectivity
    // ------------------------------------------------------------------

    /// Probes backend liveness, for connectivity labeling only.
    pub async fn backend_healthy(&self) -> bool {
        self.backend.health().await
    }

    /// Archives a session snapshot, logging (not propagating) failures.
    async fn archive_session(&self, session_id: &str) {
        let Some(archive) = &self.archive else {
            return;
        };
        if let Some(session) = self.engine.session(session_id).await {
            if let Err(e) = archive.save(&session).await {
                tracing::warn!("failed to archive session '{}': {}", session_id, e);
            }
        }
    }
}
