//! Prior-run state persistence
//!
//! A small JSON blob carried between the restore and save phases of a run:
//! the cache key that was computed at restore time and the cargo binaries
//! that were already installed. The save phase uses it to skip grooming
//! when the restored cache already matches, and to avoid re-caching
//! pre-installed binaries.

use crate::error::{GroomError, GroomResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// State captured at restore time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroomState {
    /// The primary cache key computed at restore time
    pub cache_key: String,

    /// The key the restored cache actually matched, if any
    pub matched_key: Option<String>,

    /// Cargo binaries present before the build ran
    pub cargo_bins: Vec<String>,

    /// When this state was written
    pub saved_at: DateTime<Utc>,
}

impl GroomState {
    pub fn new(cache_key: String, matched_key: Option<String>, cargo_bins: Vec<String>) -> Self {
        Self {
            cache_key,
            matched_key,
            cargo_bins,
            saved_at: Utc::now(),
        }
    }

    /// Default state file location
    pub fn default_path() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cargo-groom")
            .join("state.json")
    }

    /// Whether the restored cache already matches the current key, making
    /// a groom-and-save pass redundant
    pub fn is_up_to_date(&self, cache_key: &str) -> bool {
        self.matched_key.as_deref() == Some(cache_key) && self.cache_key == cache_key
    }

    /// Load state from `path`
    pub async fn load(path: &Path) -> GroomResult<Self> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(GroomError::StateNotFound(path.to_path_buf()))
            }
            Err(e) => {
                return Err(GroomError::io(
                    format!("reading state from {}", path.display()),
                    e,
                ))
            }
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Save state to `path`, creating parent directories as needed
    pub async fn save(&self, path: &Path) -> GroomResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| GroomError::StateDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .map_err(|e| GroomError::io(format!("writing state to {}", path.display()), e))?;
        debug!("state saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/state.json");

        let state = GroomState::new(
            "v1-rust-linux-x86_64-abc-def".to_string(),
            Some("v1-rust-linux-x86_64-abc-def".to_string()),
            vec!["rg".to_string()],
        );
        state.save(&path).await.unwrap();

        let loaded = GroomState::load(&path).await.unwrap();
        assert_eq!(loaded.cache_key, state.cache_key);
        assert_eq!(loaded.cargo_bins, vec!["rg"]);
    }

    #[tokio::test]
    async fn missing_state_is_distinct_error() {
        let dir = TempDir::new().unwrap();
        let err = GroomState::load(&dir.path().join("none.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, GroomError::StateNotFound(_)));
    }

    #[test]
    fn up_to_date_requires_exact_match() {
        let key = "v1-rust-linux-x86_64-abc-def";
        let hit = GroomState::new(key.to_string(), Some(key.to_string()), vec![]);
        assert!(hit.is_up_to_date(key));

        // restored under a fallback key: not up to date
        let partial = GroomState::new(
            key.to_string(),
            Some("v1-rust-linux-x86_64-abc".to_string()),
            vec![],
        );
        assert!(!partial.is_up_to_date(key));

        let miss = GroomState::new(key.to_string(), None, vec![]);
        assert!(!miss.is_up_to_date(key));
    }
}
