//! HTTP implementation of the backend boundary.
//!
//! Talks to the backend service over REST, consuming the streaming chat
//! endpoint as server-sent events: each `data:` line carries one JSON
//! [`StreamEvent`], and the sequence terminates in exactly one `done` or
//! `error` event.

use crate::config::BackendConfig;
use async_trait::async_trait;
use cairn_core::backend::ChatBackend;
use cairn_core::document::{Document, DocumentScope};
use cairn_core::error::{CairnError, Result};
use cairn_core::session::StreamEvent;
use futures::StreamExt;
use reqwest::{Client, multipart};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Capacity of the per-turn event channel.
const STREAM_CHANNEL_CAPACITY: usize = 32;

/// Upload endpoint response.
///
/// Older backend revisions only echo the filename; the id, size, and url
/// fields are therefore optional on the wire.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    url: Option<String>,
}

/// Backend client over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Creates a new client with the provided configuration.
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Creates a client from `~/.config/cairn/backend.json` / environment.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if an existing configuration file cannot
    /// be read or parsed.
    pub fn try_from_env() -> Result<Self> {
        Ok(Self::new(BackendConfig::load()?))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn stream_chat(
        &self,
        session_id: &str,
        user: &str,
        text: &str,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let response = self
            .client
            .get(self.endpoint("chat"))
            .query(&[("session_id", session_id), ("message", text), ("user", user)])
            .send()
            .await
            .map_err(|e| CairnError::transport(format!("chat request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(CairnError::transport(format!(
                "chat request rejected with status {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut buffer = LineBuffer::new();
            let mut flush_tail = true;
            'receive: while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        tracing::warn!("chat stream dropped: {}", err);
                        // Receiver treats the closed channel as transport failure.
                        flush_tail = false;
                        break;
                    }
                };
                for line in buffer.push(&chunk) {
                    if forward_line(&line, &tx).await == LineOutcome::Stop {
                        flush_tail = false;
                        break 'receive;
                    }
                }
            }
            // A final data line may arrive without a trailing newline.
            if flush_tail {
                if let Some(line) = buffer.finish() {
                    forward_line(&line, &tx).await;
                }
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
        let url = match (scope, session_id) {
            (DocumentScope::Temporary, Some(sid)) => self.endpoint(&format!("upload/temp/{}", sid)),
            (DocumentScope::Permanent, None) => self.endpoint("upload/global"),
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
        };

        let size_bytes = bytes.len() as u64;
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime.as_ref())
            .map_err(|e| CairnError::internal(format!("invalid mime type: {}", e)))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .timeout(self.config.request_timeout())
            .send()
            .await
            .map_err(|e| CairnError::transport(format!("upload request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(CairnError::transport(format!(
                "upload rejected with status {}",
                response.status()
            )));
        }
        let descriptor: UploadResponse = response
            .json()
            .await
            .map_err(|e| CairnError::transport(format!("invalid upload response: {}", e)))?;

        Ok(Document {
            id: descriptor
                .id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: descriptor.filename.unwrap_or_else(|| file_name.to_string()),
            size_bytes: descriptor.size.unwrap_or(size_bytes),
            scope,
            session_id: session_id.map(str::to_string),
            uploaded_at: chrono::Utc::now().to_rfc3339(),
            url: descriptor.url,
        })
    }

    async fn submit_form(&self, form_id: &str, values: &Map<String, Value>) -> Result<()> {
        let payload = serde_json::json!({
            "form_id": form_id,
            "data": values,
        });
        let response = self
            .client
            .post(self.endpoint("forms"))
            .json(&payload)
            .timeout(self.config.request_timeout())
            .send()
            .await
            .map_err(|e| CairnError::transport(format!("form submission failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(CairnError::transport(format!(
                "form submission rejected with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn health(&self) -> bool {
        match self
            .client
            .get(self.endpoint("health"))
            .timeout(self.config.request_timeout())
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Accumulates raw stream bytes and yields complete lines.
struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Appends a chunk and returns the lines it completed.
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(newline) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=newline).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Returns the unterminated final line, if any.
    fn finish(self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.buf).into_owned())
        }
    }
}

#[derive(PartialEq)]
enum LineOutcome {
    Continue,
    Stop,
}

/// Parses one SSE line and forwards its event, if any.
async fn forward_line(line: &str, tx: &mpsc::Sender<StreamEvent>) -> LineOutcome {
    let Some(payload) = sse_data(line) else {
        return LineOutcome::Continue;
    };
    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => {
            let terminal = matches!(event, StreamEvent::Done | StreamEvent::Error { .. });
            if tx.send(event).await.is_err() || terminal {
                LineOutcome::Stop
            } else {
                LineOutcome::Continue
            }
        }
        Err(err) => {
            tracing::warn!("unparseable stream payload: {}", err);
            let _ = tx
                .send(StreamEvent::Error {
                    message: format!("unparseable stream payload: {}", err),
                })
                .await;
            LineOutcome::Stop
        }
    }
}

/// Extracts the payload of an SSE `data:` line, if this is one.
fn sse_data(line: &str) -> Option<&str> {
    let line = line.trim_end_matches(['\r', '\n']);
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}
