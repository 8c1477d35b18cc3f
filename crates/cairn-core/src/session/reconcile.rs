//! Stream reconciliation.
//!
//! Folds the ordered event sequence of one assistant turn into a single
//! finalized message. The reconciler owns the in-progress message; the
//! engine reads snapshots after each applied event and handles registry
//! side effects signalled through [`StreamStep`].

use super::event::StreamEvent;
use super::message::{Message, MessageState};
use crate::error::{CairnError, Result};
use crate::form::FormSpec;

/// What the engine must do after an event was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamStep {
    /// Event absorbed into the message; keep reading.
    Continue,
    /// A form arrived: register it with the form registry and, if the
    /// registry accepts it, record the id via [`StreamReconciler::record_form`].
    FormAttached { form_id: String, spec: FormSpec },
    /// Terminal event applied; the stream is closed.
    Finished,
}

/// Folds one stream's events into one finalized assistant message.
///
/// Invariants:
/// - Tokens and sources are appended in arrival order, never reordered or
///   deduplicated.
/// - The message reaches exactly one terminal state; events after that are
///   protocol violations and the reconciler stays closed.
pub struct StreamReconciler {
    message: Message,
    closed: bool,
}

impl StreamReconciler {
    /// Creates a reconciler around a `Streaming` placeholder message.
    pub fn new(message: Message) -> Self {
        debug_assert_eq!(message.state, MessageState::Streaming);
        Self {
            message,
            closed: false,
        }
    }

    /// Applies one event.
    ///
    /// # Errors
    ///
    /// Returns a `Protocol` error if the stream already reached a terminal
    /// state. The message is left finalized as it was.
    pub fn apply(&mut self, event: StreamEvent) -> Result<StreamStep> {
        if self.closed {
            return Err(CairnError::protocol(format!(
                "event received after stream for message '{}' closed",
                self.message.id
            )));
        }
        match event {
            StreamEvent::Token { text } => {
                self.message.body.push_str(&text);
                Ok(StreamStep::Continue)
            }
            StreamEvent::Source { source } => {
                self.message.sources.push(source);
                Ok(StreamStep::Continue)
            }
            StreamEvent::Form { id, spec } => Ok(StreamStep::FormAttached { form_id: id, spec }),
            StreamEvent::Error { message } => {
                tracing::warn!(
                    "stream for message '{}' reported error: {}",
                    self.message.id,
                    message
                );
                self.finalize(MessageState::Failed);
                Ok(StreamStep::Finished)
            }
            StreamEvent::Done => {
                self.finalize(MessageState::Complete);
                Ok(StreamStep::Finished)
            }
        }
    }

    /// Records a successfully registered form id on the message.
    ///
    /// Called only after the form registry accepted the attach, so the
    /// message never references a form owned by another message.
    pub fn record_form(&mut self, form_id: &str) {
        self.message.form_ids.push(form_id.to_string());
    }

    /// Aborts reconciliation, equivalent to receiving an `Error` event.
    ///
    /// Used when the stream drops before a terminal event or the user
    /// cancels the turn. Idempotent.
    pub fn abort(&mut self) {
        if !self.closed {
            self.finalize(MessageState::Failed);
        }
    }

    /// Returns true once a terminal event (or abort) was applied.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Snapshot of the in-progress (or finalized) message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Consumes the reconciler, yielding the message in its current state.
    pub fn into_message(self) -> Message {
        self.message
    }

    fn finalize(&mut self, state: MessageState) {
        self.message.state = state;
        self.closed = true;
    }
}
