#[cfg(test)]
mod tests {
    use crate::backend::ChatBackend;
    use crate::document::{Document, DocumentRegistry, DocumentScope};
    use crate::error::Result;
    use crate::form::{FormRegistry, FormSpec, FormState};
    use crate::session::engine::SessionEngine;
    use crate::session::message::{MessageRole, MessageState, Source};
    use crate::session::{Session, StreamEvent};
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{Mutex, Notify, mpsc};

    /// One scripted assistant turn.
    struct Script {
        events: Vec<StreamEvent>,
        /// When set, the turn waits on this gate before emitting anything.
        gate: Option<Arc<Notify>>,
        /// When true, the sender is dropped without a terminal event.
        drop_early: bool,
    }

    impl Script {
        fn events(events: Vec<StreamEvent>) -> Self {
            Self {
                events,
                gate: None,
                drop_early: false,
            }
        }
    }

    /// Mock backend replaying scripted event sequences.
    struct ScriptedBackend {
        scripts: Mutex<VecDeque<Script>>,
    }

    impl ScriptedBackend {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn stream_chat(
            &self,
            _session_id: &str,
            _user: &str,
            _text: &str,
        ) -> Result<mpsc::Receiver<StreamEvent>> {
            let Some(script) = self.scripts.lock().await.pop_front() else {
                return Err(crate::error::CairnError::transport(
                    "backend unreachable",
                ));
            };
            let (tx, rx) = mpsc::channel(16);
            tokio::spawn(async move {
                if let Some(gate) = &script.gate {
                    gate.notified().await;
                }
                for event in script.events {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                if script.drop_early {
                    drop(tx);
                }
            });
            Ok(rx)
        }

        async fn upload_document(
            &self,
            scope: DocumentScope,
            session_id: Option<&str>,
            file_name: &str,
            bytes: Vec<u8>,
        ) -> Result<Document> {
            Ok(Document {
                id: format!("doc-{}", file_name),
                name: file_name.to_string(),
                size_bytes: bytes.len() as u64,
                scope,
                session_id: session_id.map(str::to_string),
                uploaded_at: chrono::Utc::now().to_rfc3339(),
                url: None,
            })
        }

        async fn submit_form(
            &self,
            _form_id: &str,
            _values: &Map<String, Value>,
        ) -> Result<()> {
            Ok(())
        }

        async fn health(&self) -> bool {
            true
        }
    }

    fn token(text: &str) -> StreamEvent {
        StreamEvent::Token {
            text: text.to_string(),
        }
    }

    fn engine_with(scripts: Vec<Script>) -> (Arc<SessionEngine>, Arc<DocumentRegistry>, Arc<FormRegistry>) {
        let documents = Arc::new(DocumentRegistry::new());
        let forms = Arc::new(FormRegistry::new());
        let engine = Arc::new(SessionEngine::new(
            Arc::new(ScriptedBackend::new(scripts)),
            documents.clone(),
            forms.clone(),
            "user",
        ));
        (engine, documents, forms)
    }

    async fn create(engine: &SessionEngine) -> Session {
        engine.create_session().await
    }

    #[tokio::test]
    async fn test_full_turn_scenario() {
        let (engine, _, _) = engine_with(vec![Script::events(vec![
            token("Hi"),
            token(" there"),
            StreamEvent::Source {
                source: Source {
                    doc_id: "D1".to_string(),
                    page: 2,
                    chunk_id: 0,
                    text: "excerpt".to_string(),
                },
            },
            StreamEvent::Done,
        ])]);
        let session = create(&engine).await;

        let reply = engine.send_message(&session.id, "hello").await.unwrap();
        assert_eq!(reply.body, "Hi there");
        assert_eq!(reply.state, MessageState::Complete);
        assert_eq!(reply.sources.len(), 1);

        let session = engine.session(&session.id).await.unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, MessageRole::User);
        assert_eq!(session.messages[0].body, "hello");
        assert_eq!(session.messages[0].state, MessageState::Complete);
        assert_eq!(session.messages[1].role, MessageRole::Assistant);
        assert_eq!(session.title, "hello");
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected_without_state_change() {
        let (engine, _, _) = engine_with(vec![]);
        let session = create(&engine).await;

        let err = engine.send_message(&session.id, "   ").await.unwrap_err();
        assert!(err.is_validation());

        let session = engine.session(&session.id).await.unwrap();
        assert!(session.messages.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (engine, _, _) = engine_with(vec![]);
        let err = engine.send_message("missing", "hi").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_concurrent_send_is_conflict_and_first_stream_unaffected() {
        let gate = Arc::new(Notify::new());
        let mut slow = Script::events(vec![token("slow"), StreamEvent::Done]);
        slow.gate = Some(gate.clone());
        let (engine, _, _) = engine_with(vec![slow]);
        let session = create(&engine).await;

        let first = {
            let engine = engine.clone();
            let session_id = session.id.clone();
            tokio::spawn(async move { engine.send_message(&session_id, "one").await })
        };
        // Let the first turn claim the stream slot.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = engine.send_message(&session.id, "two").await.unwrap_err();
        assert!(err.is_conflict());

        gate.notify_one();
        let reply = first.await.unwrap().unwrap();
        assert_eq!(reply.body, "slow");
        assert_eq!(reply.state, MessageState::Complete);
    }

    #[tokio::test]
    async fn test_error_event_preserves_partial_text() {
        let (engine, _, _) = engine_with(vec![Script::events(vec![
            token("one "),
            token("two "),
            token("three"),
            StreamEvent::Error {
                message: "backend failed".to_string(),
            },
        ])]);
        let session = create(&engine).await;

        let reply = engine.send_message(&session.id, "hi").await.unwrap();
        assert_eq!(reply.body, "one two three");
        assert_eq!(reply.state, MessageState::Failed);

        // The session is idle again: a new send passes the conflict check
        // (and only fails because the mock backend has no script left).
        let err = engine.send_message(&session.id, "again").await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_stream_drop_without_terminal_is_transport_error() {
        let mut script = Script::events(vec![token("partial")]);
        script.drop_early = true;
        let (engine, _, _) = engine_with(vec![script]);
        let session = create(&engine).await;

        let err = engine.send_message(&session.id, "hi").await.unwrap_err();
        assert!(err.is_transport());

        // The partial message is finalized rather than discarded.
        let session = engine.session(&session.id).await.unwrap();
        let assistant = &session.messages[1];
        assert_eq!(assistant.body, "partial");
        assert_eq!(assistant.state, MessageState::Failed);
    }

    #[tokio::test]
    async fn test_events_after_done_are_protocol_errors() {
        let (engine, _, _) = engine_with(vec![Script::events(vec![
            token("hi"),
            StreamEvent::Done,
            token("late"),
        ])]);
        let session = create(&engine).await;

        let err = engine.send_message(&session.id, "hello").await.unwrap_err();
        assert!(err.is_protocol());

        let session = engine.session(&session.id).await.unwrap();
        let assistant = &session.messages[1];
        assert_eq!(assistant.body, "hi");
        assert_eq!(assistant.state, MessageState::Complete);
    }

    #[tokio::test]
    async fn test_cancel_finalizes_partial_message_and_frees_session() {
        let gate = Arc::new(Notify::new());
        let mut script = Script::events(vec![StreamEvent::Done]);
        script.gate = Some(gate.clone());
        let (engine, _, _) = engine_with(vec![script]);
        let session = create(&engine).await;

        let turn = {
            let engine = engine.clone();
            let session_id = session.id.clone();
            tokio::spawn(async move { engine.send_message(&session_id, "hi").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        engine.cancel_stream(&session.id).await.unwrap();
        let reply = turn.await.unwrap().unwrap();
        assert_eq!(reply.state, MessageState::Failed);

        // Back to idle: cancelling again reports no active stream.
        let err = engine.cancel_stream(&session.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_form_event_registers_pending_form() {
        let spec = FormSpec {
            title: "Details".to_string(),
            description: None,
            fields: Vec::new(),
            submit_label: None,
        };
        let (engine, _, forms) = engine_with(vec![Script::events(vec![
            token("fill this in"),
            StreamEvent::Form {
                id: "f1".to_string(),
                spec: spec.clone(),
            },
            StreamEvent::Done,
        ])]);
        let session = create(&engine).await;

        let reply = engine.send_message(&session.id, "hi").await.unwrap();
        assert_eq!(reply.form_ids, vec!["f1".to_string()]);

        let form = forms.get("f1").await.unwrap();
        assert_eq!(form.state, FormState::Pending);
        assert_eq!(form.message_id, reply.id);
        assert_eq!(form.spec, spec);
    }

    #[tokio::test]
    async fn test_duplicate_form_id_stays_with_its_first_message() {
        let spec = FormSpec {
            title: "Details".to_string(),
            description: None,
            fields: Vec::new(),
            submit_label: None,
        };
        let (engine, _, forms) = engine_with(vec![
            Script::events(vec![
                StreamEvent::Form {
                    id: "f1".to_string(),
                    spec: spec.clone(),
                },
                StreamEvent::Done,
            ]),
            Script::events(vec![
                StreamEvent::Form {
                    id: "f1".to_string(),
                    spec,
                },
                StreamEvent::Done,
            ]),
        ]);
        let session = create(&engine).await;

        let first = engine.send_message(&session.id, "one").await.unwrap();
        let second = engine.send_message(&session.id, "two").await.unwrap();

        // The rejected re-attach leaves no dangling reference on the
        // second message; the form stays owned by the first.
        assert_eq!(first.form_ids, vec!["f1".to_string()]);
        assert!(second.form_ids.is_empty());
        assert_eq!(forms.get("f1").await.unwrap().message_id, first.id);
        assert!(forms.list_for_message(&second.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_session_cascades_temporary_documents() {
        let (engine, documents, _) = engine_with(vec![]);
        let session = create(&engine).await;

        documents
            .register(Document {
                id: "d1".to_string(),
                name: "notes.pdf".to_string(),
                size_bytes: 10,
                scope: DocumentScope::Temporary,
                session_id: Some(session.id.clone()),
                uploaded_at: chrono::Utc::now().to_rfc3339(),
                url: None,
            })
            .await
            .unwrap();
        documents
            .register(Document {
                id: "p1".to_string(),
                name: "handbook.pdf".to_string(),
                size_bytes: 10,
                scope: DocumentScope::Permanent,
                session_id: None,
                uploaded_at: chrono::Utc::now().to_rfc3339(),
                url: None,
            })
            .await
            .unwrap();

        engine.delete_session(&session.id).await.unwrap();
        assert!(engine.session(&session.id).await.is_none());
        assert!(documents.get("d1").await.is_none());
        assert!(documents.get("p1").await.is_some());

        // Idempotent: deleting an absent session is a no-op.
        engine.delete_session(&session.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_edit_message_only_touches_complete_user_messages() {
        let (engine, _, _) = engine_with(vec![Script::events(vec![
            token("reply"),
            StreamEvent::Done,
        ])]);
        let session = create(&engine).await;
        engine.send_message(&session.id, "hello").await.unwrap();

        let session_snapshot = engine.session(&session.id).await.unwrap();
        let user_id = session_snapshot.messages[0].id.clone();
        let assistant_id = session_snapshot.messages[1].id.clone();

        let edited = engine
            .edit_message(&session.id, &user_id, "hello, edited")
            .await
            .unwrap();
        assert_eq!(edited.body, "hello, edited");

        let err = engine
            .edit_message(&session.id, &assistant_id, "nope")
            .await
            .unwrap_err();
        assert!(err.is_validation());

        // Editing does not re-send: the transcript length is unchanged.
        let session_snapshot = engine.session(&session.id).await.unwrap();
        assert_eq!(session_snapshot.messages.len(), 2);
    }
}
