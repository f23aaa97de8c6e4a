//! # Baseline Store
//!
//! Persists the last-synced baseline: the snapshot both sides agreed on at the
//! end of the previous sync. It is the merge base for the next three-way
//! reconciliation.
//!
//! The baseline is only saved after the local file and the remote store have
//! both been written, so an interrupted sync never reapplies changes or
//! reports them as new conflicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::BASELINE_FILE_SUFFIX;
use crate::error::{SyncError, SyncResult};
use crate::model::{Snapshot, Stage};

use super::local::write_atomic;

/// On-disk baseline contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub stage: Option<Stage>,
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub values: Snapshot,
}

impl Baseline {
    /// False when this baseline was recorded for a different project or stage
    #[must_use]
    pub fn belongs_to(&self, project_id: &str, stage: Stage) -> bool {
        self.synced_at.is_none() || (self.project_id == project_id && self.stage == Some(stage))
    }
}

/// Baseline file stored next to the env file
#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `.<env file name>.envzip-state.json` in the env file's directory
    #[must_use]
    pub fn for_env_file(env_path: &Path) -> Self {
        let file_name = env_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".env".to_string());
        let name = format!(".{}{BASELINE_FILE_SUFFIX}", file_name.trim_start_matches('.'));
        Self::new(env_path.with_file_name(name))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the baseline; a missing or unreadable file means "never synced"
    pub async fn load(&self) -> SyncResult<Baseline> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No baseline at {}, starting fresh", self.path.display());
                return Ok(Baseline::default());
            }
            Err(e) => return Err(SyncError::Baseline(e.to_string())),
        };

        match serde_json::from_str(&content) {
            Ok(baseline) => Ok(baseline),
            Err(e) => {
                // Treated as never synced: every differing key becomes a conflict, nothing is lost
                warn!(
                    "Ignoring corrupt baseline {}: {}",
                    self.path.display(),
                    e
                );
                Ok(Baseline::default())
            }
        }
    }

    pub async fn save(&self, baseline: &Baseline) -> SyncResult<()> {
        let bytes = serde_json::to_vec_pretty(baseline)
            .map_err(|e| SyncError::Baseline(e.to_string()))?;
        write_atomic(&self.path, &bytes)
            .await
            .map_err(|e| SyncError::Baseline(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_path_next_to_env_file() {
        let store = BaselineStore::for_env_file(Path::new("/work/app/.env"));
        assert_eq!(store.path(), Path::new("/work/app/.env.envzip-state.json"));

        let store = BaselineStore::for_env_file(Path::new("/work/app/prod.env"));
        assert_eq!(store.path(), Path::new("/work/app/.prod.env.envzip-state.json"));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::for_env_file(&dir.path().join(".env"));
        assert_eq!(store.load().await.unwrap(), Baseline::default());

        let mut baseline = Baseline {
            project_id: "proj".into(),
            stage: Some(Stage::Staging),
            synced_at: Some(Utc::now()),
            values: Snapshot::new(),
        };
        baseline.values.insert("A".into(), "1".into());
        store.save(&baseline).await.unwrap();

        assert_eq!(store.load().await.unwrap(), baseline);
    }

    #[tokio::test]
    async fn test_corrupt_baseline_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::for_env_file(&dir.path().join(".env"));
        tokio::fs::write(store.path(), "{not json").await.unwrap();
        assert_eq!(store.load().await.unwrap(), Baseline::default());
    }

    #[test]
    fn test_belongs_to() {
        let baseline = Baseline {
            project_id: "p".into(),
            stage: Some(Stage::Production),
            synced_at: Some(Utc::now()),
            values: Snapshot::new(),
        };
        assert!(baseline.belongs_to("p", Stage::Production));
        assert!(!baseline.belongs_to("p", Stage::Development));
        assert!(Baseline::default().belongs_to("anything", Stage::Staging));
    }
}
