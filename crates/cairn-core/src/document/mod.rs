//! Document domain module.
//!
//! Uploaded documents and their scope handling.
//!
//! # Module Structure
//!
//! - `model`: Document domain types (`Document`, `DocumentScope`)
//! - `registry`: Process-wide document tracking with cascade support (`DocumentRegistry`)

mod model;
mod registry;

// Re-export public API
pub use model::{Document, DocumentScope};
pub use registry::DocumentRegistry;
