//! Registration state persistence, so a restart can fall back to the last
//! version that activated.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The version that was last promoted to active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationState {
    /// Identifies the activation, for log correlation.
    pub id: String,
    /// Cache name of the active worker.
    pub active_version: String,
    pub activated_at: DateTime<Utc>,
}

impl RegistrationState {
    /// Records `version` as active now.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            active_version: version.into(),
            activated_at: Utc::now(),
        }
    }

    /// Saves the state atomically (write tmp + rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        let written =
            std::fs::write(&tmp_path, toml::to_string(self)?).and_then(|()| std::fs::rename(&tmp_path, path));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Loads the state, or `None` if there is no readable state at `path`.
    #[must_use]
    pub fn load(path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&contents) {
            Ok(state) => Some(state),
            Err(e) => {
                log::warn!("Ignoring unreadable state at {}: {e}", path.display());
                None
            }
        }
    }
}
