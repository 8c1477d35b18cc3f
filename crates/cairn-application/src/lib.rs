//! Application layer for Cairn.
//!
//! This crate provides the use case implementation that coordinates the
//! domain and infrastructure layers into the surface a presentation layer
//! consumes.

pub mod session_usecase;

pub use session_usecase::SessionUseCase;
