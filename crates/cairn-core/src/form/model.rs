//! Form domain model.
//!
//! Forms are structured input requests issued by the assistant
//! mid-conversation. The assistant stream attaches a form to a specific
//! message; the user fills it in and submits it exactly once.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of input a form field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Number,
    Date,
    #[serde(rename = "textarea")]
    TextArea,
    Select,
    Checkbox,
}

/// A single field in a form specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    /// Key used in the submitted value map.
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// Input kind.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Whether a value must be supplied on submission.
    #[serde(default)]
    pub required: bool,
    /// Choices for `Select` fields.
    #[serde(default)]
    pub options: Vec<String>,
    /// Optional placeholder text.
    #[serde(default)]
    pub placeholder: Option<String>,
}

/// The backend-issued specification of a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSpec {
    /// Form title.
    pub title: String,
    /// Optional longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered list of fields.
    pub fields: Vec<FormField>,
    /// Label for the submit control; defaults to "Submit" when absent.
    #[serde(default)]
    pub submit_label: Option<String>,
}

/// Submission state of a form.
///
/// Modeled as a tagged enum rather than a boolean so a future
/// `Failed`/`Expired` state can be added without breaking the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormState {
    /// Waiting for the user to fill in and submit.
    Pending,
    /// Submitted successfully; resubmission is rejected.
    Submitted,
}

/// A form instance attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    /// Unique form identifier (assigned by the backend stream).
    pub id: String,
    /// Id of the message this form is attached to.
    pub message_id: String,
    /// The backend-issued specification.
    pub spec: FormSpec,
    /// Submission state.
    pub state: FormState,
    /// Values recorded by the one successful submission.
    #[serde(default)]
    pub values: Option<Map<String, Value>>,
}

impl Form {
    /// Creates a new form in the `Pending` state.
    pub fn pending(
        id: impl Into<String>,
        message_id: impl Into<String>,
        spec: FormSpec,
    ) -> Self {
        Self {
            id: id.into(),
            message_id: message_id.into(),
            spec,
            state: FormState::Pending,
            values: None,
        }
    }
}
