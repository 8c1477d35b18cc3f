//! Stream events emitted by the backend for one assistant turn.

use super::message::Source;
use crate::form::FormSpec;
use serde::{Deserialize, Serialize};

/// One event in the ordered sequence the backend emits while answering.
///
/// The sequence for a turn terminates in exactly one `Done` or `Error`;
/// anything received after that is a protocol violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of assistant text, to be appended in arrival order.
    Token { text: String },
    /// A citation source for the in-progress message.
    Source {
        #[serde(flatten)]
        source: Source,
    },
    /// A form the assistant attaches to the in-progress message.
    Form {
        id: String,
        #[serde(rename = "form")]
        spec: FormSpec,
    },
    /// The backend failed mid-turn; accumulated text is kept.
    Error { message: String },
    /// The turn finished normally.
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_wire_format() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"token","text":"Hi"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Token {
                text: "Hi".to_string()
            }
        );
    }

    #[test]
    fn test_source_wire_format_is_flattened() {
        let event: StreamEvent = serde_json::from_str(
            r#"{"type":"source","doc_id":"D1","page":2,"chunk_id":0,"text":"excerpt"}"#,
        )
        .unwrap();
        match event {
            StreamEvent::Source { source } => {
                assert_eq!(source.doc_id, "D1");
                assert_eq!(source.page, 2);
                assert_eq!(source.chunk_id, 0);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_done_wire_format() {
        let event: StreamEvent = serde_json::from_str(r#"{"type":"done"}"#).unwrap();
        assert_eq!(event, StreamEvent::Done);
    }
}
