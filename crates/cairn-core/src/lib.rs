//! Core domain layer for the Cairn conversational assistant engine.
//!
//! This crate owns session identity and transcripts, stream reconciliation,
//! and the document and form registries. It knows nothing about transports
//! or storage formats; those live behind the [`backend::ChatBackend`] and
//! [`session::SessionRepository`] traits.

pub mod backend;
pub mod document;
pub mod error;
pub mod form;
pub mod session;

// Re-export common error type
pub use error::CairnError;
