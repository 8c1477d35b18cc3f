//! Backend boundary for the Cairn engine.
//!
//! This crate provides the HTTP implementation of the core's
//! [`cairn_core::backend::ChatBackend`] trait plus its endpoint
//! configuration.

pub mod config;
pub mod http_backend;

pub use config::BackendConfig;
pub use http_backend::HttpBackend;
