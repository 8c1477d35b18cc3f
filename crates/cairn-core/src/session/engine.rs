//! Session engine.
//!
//! The composition root of the interaction core: owns session identity and
//! transcripts, drives the stream reconciler for each assistant turn, and
//! coordinates the document and form registries.

use super::message::{Message, MessageRole, MessageState};
use super::model::Session;
use super::reconcile::{StreamReconciler, StreamStep};
use crate::backend::ChatBackend;
use crate::document::DocumentRegistry;
use crate::error::{CairnError, Result};
use crate::form::FormRegistry;
use crate::session::StreamEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Manages sessions and their lifecycle.
///
/// `SessionEngine` is responsible for:
/// - Creating and deleting sessions (with the temporary-document cascade)
/// - Accepting user messages and streaming the assistant's reply
/// - Enforcing one in-flight assistant turn per session
/// - Editing user messages
///
/// Each session's state transitions are serial: the engine rejects a second
/// concurrent `send_message` for the same session, so one stream never
/// interleaves tokens with another into the same message body. Different
/// sessions stream independently.
pub struct SessionEngine {
    /// In-memory session store
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    /// Cancellation handles for in-flight assistant turns, keyed by session id.
    /// Presence of a key means the session is in the `Streaming` state.
    active_streams: Arc<RwLock<HashMap<String, CancellationToken>>>,
    /// Shared document registry (process-wide, scoped by owning session id)
    documents: Arc<DocumentRegistry>,
    /// Shared form registry
    forms: Arc<FormRegistry>,
    /// Backend service for streaming chat
    backend: Arc<dyn ChatBackend>,
    /// Pre-established user identity forwarded to the backend
    user: String,
}

impl SessionEngine {
    /// Creates a new `SessionEngine`.
    ///
    /// # Arguments
    ///
    /// * `backend` - The backend service streaming assistant turns
    /// * `documents` - The shared document registry
    /// * `forms` - The shared form registry
    /// * `user` - Pre-established user identity forwarded to the backend
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        documents: Arc<DocumentRegistry>,
        forms: Arc<FormRegistry>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            active_streams: Arc::new(RwLock::new(HashMap::new())),
            documents,
            forms,
            backend,
            user: user.into(),
        }
    }

    /// Creates a new session with an empty transcript and document scope.
    ///
    /// Always succeeds; returns a snapshot of the new session.
    pub async fn create_session(&self) -> Session {
        let session = Session::new(Uuid::new_v4().to_string());
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        tracing::info!("created session '{}'", session.id);
        session
    }

    /// Inserts a restored session (e.g. loaded from an archive).
    ///
    /// An existing in-memory session with the same id is replaced.
    pub async fn insert_session(&self, session: Session) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session);
    }

    /// Returns a snapshot of the session with the given id.
    pub async fn session(&self, session_id: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    /// Returns true if the session exists.
    pub async fn session_exists(&self, session_id: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions.contains_key(session_id)
    }

    /// Returns snapshots of all sessions, ordered by creation time ascending.
    pub async fn list_sessions(&self) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        let mut all: Vec<Session> = sessions.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Sends a user message and streams the assistant's reply to completion.
    ///
    /// Appends the (immediately complete) user message, opens the backend
    /// stream, appends a streaming assistant placeholder, and folds events
    /// into it until a terminal state. The transcript grows monotonically;
    /// the user message always precedes the assistant message it triggered.
    ///
    /// Returns the finalized assistant message. A backend-reported `error`
    /// event still returns `Ok`: the failure is represented by the
    /// message's `Failed` state with its accumulated text preserved.
    ///
    /// # Errors
    ///
    /// - `Validation` if `text` is empty or whitespace-only
    /// - `NotFound` if the session does not exist
    /// - `Conflict` if a stream is already active for this session
    /// - `Transport` if the stream cannot be opened or drops without a
    ///   terminal event (the partial message is finalized as `Failed`)
    /// - `Protocol` if events arrive after the terminal event
    pub async fn send_message(&self, session_id: &str, text: &str) -> Result<Message> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CairnError::validation("message text must not be empty"));
        }

        // Claim the session's single stream slot before touching the transcript.
        let cancel = {
            if !self.session_exists(session_id).await {
                return Err(CairnError::not_found("Session", session_id));
            }
            let mut active = self.active_streams.write().await;
            if active.contains_key(session_id) {
                return Err(CairnError::conflict(format!(
                    "a stream is already active for session '{}'",
                    session_id
                )));
            }
            let token = CancellationToken::new();
            active.insert(session_id.to_string(), token.clone());
            token
        };

        let result = self.run_turn(session_id, trimmed, cancel).await;

        let mut active = self.active_streams.write().await;
        active.remove(session_id);
        result
    }

    /// Cancels the in-flight assistant turn for a session.
    ///
    /// Equivalent to the stream receiving an `error` event: the partial
    /// message is finalized as `Failed` with its text preserved.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no stream is active for this session.
    pub async fn cancel_stream(&self, session_id: &str) -> Result<()> {
        let active = self.active_streams.read().await;
        match active.get(session_id) {
            Some(token) => {
                tracing::debug!("cancelling stream for session '{}'", session_id);
                token.cancel();
                Ok(())
            }
            None => Err(CairnError::not_found("Stream", session_id)),
        }
    }

    /// Deletes a session and cascades deletion to its temporary documents.
    ///
    /// Permanent documents are never touched. Idempotent: deleting an
    /// absent session is a no-op.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        // Stop an in-flight turn so it cannot write into a ghost transcript.
        {
            let active = self.active_streams.read().await;
            if let Some(token) = active.get(session_id) {
                token.cancel();
            }
        }

        let removed = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(session_id)
        };
        let documents = self.documents.remove_session_documents(session_id).await;
        if removed.is_some() {
            tracing::info!(
                "deleted session '{}' and {} temporary document(s)",
                session_id,
                documents.len()
            );
        }
        Ok(())
    }

    /// Records a temporary document in the owning session's scope.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    pub async fn record_document(&self, session_id: &str, document_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| CairnError::not_found("Session", session_id))?;
        session.add_document(document_id);
        Ok(())
    }

    /// Drops a document id from a session's scope.
    ///
    /// A missing session is a no-op; the deletion cascade may already have
    /// removed it.
    pub async fn unrecord_document(&self, session_id: &str, document_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.remove_document(document_id);
        }
    }

    /// Replaces the body of a user-authored, complete message.
    ///
    /// Does not trigger a re-send; that is a separate `send_message` call.
    ///
    /// # Errors
    ///
    /// - `Validation` if the new text is blank or the message is not a
    ///   user-authored, complete message
    /// - `NotFound` if the session or message does not exist
    pub async fn edit_message(
        &self,
        session_id: &str,
        message_id: &str,
        new_text: &str,
    ) -> Result<Message> {
        let trimmed = new_text.trim();
        if trimmed.is_empty() {
            return Err(CairnError::validation("message text must not be empty"));
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| CairnError::not_found("Session", session_id))?;
        let message = session
            .message_mut(message_id)
            .ok_or_else(|| CairnError::not_found("Message", message_id))?;
        if message.role != MessageRole::User || message.state != MessageState::Complete {
            return Err(CairnError::validation(
                "only complete user messages can be edited",
            ));
        }
        message.body = trimmed.to_string();
        let edited = message.clone();
        session.touch();
        Ok(edited)
    }

    /// Runs one assistant turn: user message, stream open, reconciliation.
    async fn run_turn(
        &self,
        session_id: &str,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<Message> {
        let user_message = Message::user(Uuid::new_v4().to_string(), text);
        self.append_message(session_id, user_message).await?;

        let rx = self.backend.stream_chat(session_id, &self.user, text).await?;

        let placeholder = Message::assistant_placeholder(Uuid::new_v4().to_string());
        self.append_message(session_id, placeholder.clone()).await?;

        self.reconcile(session_id, placeholder, rx, cancel).await
    }

    /// Folds stream events into the placeholder until a terminal state,
    /// publishing a snapshot into the transcript after every event so the
    /// presentation layer sees tokens as they arrive.
    async fn reconcile(
        &self,
        session_id: &str,
        placeholder: Message,
        mut rx: mpsc::Receiver<StreamEvent>,
        cancel: CancellationToken,
    ) -> Result<Message> {
        let message_id = placeholder.id.clone();
        let mut reconciler = StreamReconciler::new(placeholder);
        let mut outcome: Result<()> = Ok(());

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("stream for session '{}' cancelled", session_id);
                    reconciler.abort();
                    break;
                }
                event = rx.recv() => event,
            };

            let Some(event) = event else {
                // Sender dropped without a terminal event: transport failure.
                if !reconciler.is_closed() {
                    reconciler.abort();
                    outcome = Err(CairnError::transport(
                        "stream closed before completion",
                    ));
                }
                break;
            };

            let step = match reconciler.apply(event) {
                Ok(step) => step,
                Err(err) => {
                    // Backend broke the contract; terminate the stream.
                    tracing::warn!(
                        "protocol violation on session '{}': {}",
                        session_id,
                        err
                    );
                    outcome = Err(err);
                    break;
                }
            };

            if let StreamStep::FormAttached { form_id, spec } = &step {
                match self.forms.attach(&message_id, form_id, spec.clone()).await {
                    Ok(_) => reconciler.record_form(form_id),
                    Err(err) => {
                        tracing::warn!(
                            "could not attach form '{}' to message '{}': {}",
                            form_id,
                            message_id,
                            err
                        );
                    }
                }
            }

            self.store_assistant(session_id, reconciler.message()).await?;

            if step == StreamStep::Finished {
                break;
            }
        }

        let message = reconciler.into_message();
        // The session may have been deleted while the turn was in flight;
        // losing the final snapshot along with it is fine.
        if let Err(err) = self.store_assistant(session_id, &message).await {
            if !err.is_not_found() {
                return Err(err);
            }
        }
        outcome.map(|_| message)
    }

    /// Appends a message to a session's transcript.
    async fn append_message(&self, session_id: &str, message: Message) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| CairnError::not_found("Session", session_id))?;
        session.push_message(message);
        Ok(())
    }

    /// Replaces the stored copy of an in-progress assistant message.
    async fn store_assistant(&self, session_id: &str, message: &Message) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| CairnError::not_found("Session", session_id))?;
        let slot = session.message_mut(&message.id).ok_or_else(|| {
            CairnError::internal(format!(
                "assistant message '{}' missing from transcript",
                message.id
            ))
        })?;
        *slot = message.clone();
        session.touch();
        Ok(())
    }
}
