//! Form domain module.
//!
//! Structured input requests issued by the assistant mid-conversation.
//!
//! # Module Structure
//!
//! - `model`: Form domain types (`Form`, `FormSpec`, `FormField`, `FieldKind`, `FormState`)
//! - `registry`: Process-wide form tracking and submission state (`FormRegistry`)

mod model;
mod registry;

// Re-export public API
pub use model::{FieldKind, Form, FormField, FormSpec, FormState};
pub use registry::FormRegistry;
