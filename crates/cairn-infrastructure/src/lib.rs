//! Infrastructure layer for the Cairn engine.
//!
//! Provides the TOML session archive implementing the core's
//! `SessionRepository` trait, plus platform path resolution.

pub mod paths;
pub mod toml_session_archive;

pub use paths::CairnPaths;
pub use toml_session_archive::TomlSessionArchive;
