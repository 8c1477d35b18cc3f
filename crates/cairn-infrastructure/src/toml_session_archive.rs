//! TOML-based SessionRepository implementation.
//!
//! Stores each session as an individual TOML file in a sessions directory.
//! Writes are atomic: the file is written to a temporary sibling and
//! renamed into place, so a crash mid-write never corrupts an archive.

use async_trait::async_trait;
use cairn_core::error::{CairnError, Result};
use cairn_core::session::{Session, SessionRepository};
use std::path::{Path, PathBuf};
use tokio::fs;

/// A repository implementation archiving session data in TOML files.
///
/// Directory structure:
/// ```text
/// base_dir/
/// └── sessions/
///     ├── session-id-1.toml
///     └── session-id-2.toml
/// ```
pub struct TomlSessionArchive {
    base_dir: PathBuf,
}

impl TomlSessionArchive {
    /// Creates a new `TomlSessionArchive` with the specified base directory.
    ///
    /// The sessions directory is created if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory structure cannot be created.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(base_dir.join("sessions")).await?;
        Ok(Self { base_dir })
    }

    /// Creates a `TomlSessionArchive` at the default location
    /// (`~/.config/cairn`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or if
    /// the directory structure cannot be created.
    pub async fn default_location() -> Result<Self> {
        let base_dir = crate::paths::CairnPaths::config_dir()
            .map_err(|e| CairnError::config(e.to_string()))?;
        Self::new(base_dir).await
    }

    /// Returns the file path for a given session ID.
    fn session_file_path(&self, session_id: &str) -> PathBuf {
        self.base_dir
            .join("sessions")
            .join(format!("{}.toml", session_id))
    }
}

#[async_trait]
impl SessionRepository for TomlSessionArchive {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        let path = self.session_file_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        let session: Session = toml::from_str(&content)?;
        Ok(Some(session))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_file_path(&session.id);
        let content = toml::to_string_pretty(session)?;

        // Atomic replace: temp sibling + rename.
        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, &path).await?;

        tracing::debug!("archived session '{}'", session.id);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let path = self.session_file_path(session_id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("removed archived session '{}'", session_id);
                Ok(())
            }
            // Deleting an absent session is a no-op.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_all(&self) -> Result<Vec<Session>> {
        let sessions_dir = self.base_dir.join("sessions");
        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&sessions_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            match toml::from_str::<Session>(&content) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    // One corrupt archive must not hide the others.
                    tracing::warn!(
                        "skipping unreadable session archive {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }
}
