//! Session domain module.
//!
//! This module contains all session-related domain models, the stream
//! reconciler, repository interface, and the session engine.
//!
//! # Module Structure
//!
//! - `model`: Core session domain model (`Session`)
//! - `message`: Transcript message types (`MessageRole`, `Message`, `Source`)
//! - `event`: Stream events (`StreamEvent`)
//! - `reconcile`: Stream reconciliation (`StreamReconciler`, `StreamStep`)
//! - `repository`: Repository trait for session archival
//! - `engine`: Session lifecycle and turn orchestration (`SessionEngine`)

mod engine;
#[cfg(test)]
mod engine_test;
mod event;
mod message;
mod model;
mod reconcile;
mod repository;

// Re-export public API
pub use engine::SessionEngine;
pub use event::StreamEvent;
pub use message::{Message, MessageRole, MessageState, Source};
pub use model::Session;
pub use reconcile::{StreamReconciler, StreamStep};
pub use repository::SessionRepository;
