//! Persisted client-local preferences
//!
//! The backend owns every chat, message, and character; the only state the
//! client keeps across restarts is a handful of non-transactional
//! key-value preferences: the last opened chat, the selected model and
//! character, and generation-argument overrides. They live in a single
//! JSON file under the platform data directory.

use crate::config::GenerationConfig;
use crate::error::{Result, WeftError};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Client-local preferences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prefs {
    /// Chat id reopened on the next `weft chat`
    #[serde(default)]
    pub last_chat_id: Option<String>,

    /// Model override; falls back to config when absent
    #[serde(default)]
    pub model: Option<String>,

    /// Character applied to new chats
    #[serde(default)]
    pub character_id: Option<String>,

    /// Generation-argument overrides; falls back to config when absent
    #[serde(default)]
    pub gen_args: Option<GenerationConfig>,
}

/// Storage location for [`Prefs`]
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    /// Creates a store rooted in the user's data directory
    ///
    /// # Errors
    ///
    /// Returns `WeftError::Prefs` if the platform data directory cannot be
    /// determined or created.
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("io", "weft", "weft")
            .ok_or_else(|| WeftError::Prefs("Could not determine data directory".to_string()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .map_err(|e| WeftError::Prefs(format!("Failed to create data directory: {}", e)))?;

        Ok(Self {
            path: data_dir.join("prefs.json"),
        })
    }

    /// Creates a store that uses the specified file path
    ///
    /// Primarily useful for tests where the default application data
    /// directory is not desirable.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads preferences, falling back to defaults
    ///
    /// A missing or unreadable file is not an error: preferences are
    /// best-effort convenience state.
    pub fn load(&self) -> Prefs {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(prefs) => prefs,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt prefs file {}: {}", self.path.display(), e);
                    Prefs::default()
                }
            },
            Err(_) => Prefs::default(),
        }
    }

    /// Saves preferences to disk
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, prefs: &Prefs) -> Result<()> {
        let contents = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}
