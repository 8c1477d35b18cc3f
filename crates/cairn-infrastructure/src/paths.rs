//! Unified path management for cairn configuration files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/cairn/             # Config directory
//! ├── backend.json             # Backend endpoint configuration
//! └── sessions/                # Archived sessions (one TOML file each)
//! ```

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for cairn.
pub struct CairnPaths;

impl CairnPaths {
    /// Returns the cairn configuration directory (`~/.config/cairn`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        let home = dirs::home_dir().ok_or(PathError::HomeDirNotFound)?;
        Ok(home.join(".config").join("cairn"))
    }

    /// Returns the session archive directory (`~/.config/cairn/sessions`).
    pub fn sessions_dir() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("sessions"))
    }
}
