//! Form registry.
//!
//! Tracks dynamically issued forms across all sessions, keyed by form id.
//! Submission is a two-step operation driven by the application layer:
//! `validate_submit` checks state and required fields before the backend
//! call, and `mark_submitted` records the values once the backend accepts
//! them. A backend failure between the two steps leaves the form `Pending`
//! so the user may retry.

use super::model::{FieldKind, Form, FormSpec, FormState};
use crate::error::{CairnError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide registry of forms issued by the assistant.
#[derive(Default)]
pub struct FormRegistry {
    forms: Arc<RwLock<HashMap<String, Form>>>,
}

impl FormRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new form in the `Pending` state, attached to a message.
    ///
    /// # Errors
    ///
    /// Returns a `Conflict` error if a form with this id already exists.
    pub async fn attach(
        &self,
        message_id: &str,
        form_id: &str,
        spec: FormSpec,
    ) -> Result<Form> {
        let mut forms = self.forms.write().await;
        if forms.contains_key(form_id) {
            return Err(CairnError::conflict(format!(
                "form '{}' already attached",
                form_id
            )));
        }
        let form = Form::pending(form_id, message_id, spec);
        forms.insert(form_id.to_string(), form.clone());
        Ok(form)
    }

    /// Returns a snapshot of the form with the given id.
    pub async fn get(&self, form_id: &str) -> Option<Form> {
        let forms = self.forms.read().await;
        forms.get(form_id).cloned()
    }

    /// Returns snapshots of all forms attached to the given message.
    ///
    /// Display order is defined by the message's own `form_ids` list, not
    /// by this map's iteration order.
    pub async fn list_for_message(&self, message_id: &str) -> Vec<Form> {
        let forms = self.forms.read().await;
        forms
            .values()
            .filter(|f| f.message_id == message_id)
            .cloned()
            .collect()
    }

    /// Validates a submission attempt without mutating anything.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no form with this id exists
    /// - `Conflict` if the form was already submitted
    /// - `Validation` if a required field is missing or blank
    pub async fn validate_submit(
        &self,
        form_id: &str,
        values: &Map<String, Value>,
    ) -> Result<()> {
        let forms = self.forms.read().await;
        let form = forms
            .get(form_id)
            .ok_or_else(|| CairnError::not_found("Form", form_id))?;
        if form.state == FormState::Submitted {
            return Err(CairnError::conflict(format!(
                "form '{}' was already submitted",
                form_id
            )));
        }
        validate_required_fields(&form.spec, values)
    }

    /// Marks the form submitted and records the values exactly once.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no form with this id exists
    /// - `Conflict` if the form was already submitted (the recorded values
    ///   from the first successful submission are left untouched)
    pub async fn mark_submitted(
        &self,
        form_id: &str,
        values: Map<String, Value>,
    ) -> Result<Form> {
        let mut forms = self.forms.write().await;
        let form = forms
            .get_mut(form_id)
            .ok_or_else(|| CairnError::not_found("Form", form_id))?;
        if form.state == FormState::Submitted {
            return Err(CairnError::conflict(format!(
                "form '{}' was already submitted",
                form_id
            )));
        }
        form.state = FormState::Submitted;
        form.values = Some(values);
        Ok(form.clone())
    }
}

/// Checks that every required field has a non-empty entry in `values`.
///
/// Checkbox fields count an explicit `false` as present; text-like fields
/// must be non-blank strings; other value types only need to be non-null.
fn validate_required_fields(spec: &FormSpec, values: &Map<String, Value>) -> Result<()> {
    for field in spec.fields.iter().filter(|f| f.required) {
        let value = values.get(&field.name);
        let present = match (field.kind, value) {
            (_, None) => false,
            (_, Some(Value::Null)) => false,
            (FieldKind::Checkbox, Some(Value::Bool(_))) => true,
            (_, Some(Value::String(s))) => !s.trim().is_empty(),
            (_, Some(_)) => true,
        };
        if !present {
            return Err(CairnError::validation(format!(
                "required field '{}' is missing",
                field.name
            )));
        }
    }
    Ok(())
}
