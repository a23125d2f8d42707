//! Checkpoint persistence for resumable crawls
//!
//! A snapshot of the entity list is written after every completed locale
//! pass and after backfill. Writes go through a temporary file and a rename
//! so an interrupted run never leaves a truncated checkpoint behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::domain::{CrawlError, CrawlResult, EntityRecord, Locale};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStage {
    /// Listing passes in progress; see `completed_locales`
    Listing,
    /// Listing and backfill both done; only enrichment remains
    Backfilled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
    pub stage: CheckpointStage,
    pub completed_locales: Vec<Locale>,
    pub saved_at: DateTime<Utc>,
    pub entities: Vec<EntityRecord>,
}

impl CheckpointSnapshot {
    pub fn new(stage: CheckpointStage, completed_locales: Vec<Locale>, entities: Vec<EntityRecord>) -> Self {
        Self {
            stage,
            completed_locales,
            saved_at: Utc::now(),
            entities,
        }
    }

    pub fn listing_complete(&self) -> bool {
        self.stage == CheckpointStage::Backfilled
            || Locale::ALL.iter().all(|l| self.completed_locales.contains(l))
    }
}

/// One checkpoint file, `<dir>/<name>.json`
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    name: String,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.name))
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", self.name))
    }

    pub async fn save(&self, snapshot: &CheckpointSnapshot) -> CrawlResult<PathBuf> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| checkpoint_error("create directory", &self.dir, e))?;

        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| CrawlError::Checkpoint(format!("Failed to serialize checkpoint: {e}")))?;

        let temp = self.temp_path();
        let target = self.path();
        fs::write(&temp, json)
            .await
            .map_err(|e| checkpoint_error("write", &temp, e))?;
        fs::rename(&temp, &target)
            .await
            .map_err(|e| checkpoint_error("replace", &target, e))?;

        info!(
            "Checkpoint saved: {} entities, stage {:?}, locales {:?} -> {}",
            snapshot.entities.len(),
            snapshot.stage,
            snapshot.completed_locales,
            target.display()
        );
        Ok(target)
    }

    /// `Ok(None)` when no checkpoint exists yet
    pub async fn load(&self) -> CrawlResult<Option<CheckpointSnapshot>> {
        let path = self.path();
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(checkpoint_error("read", &path, e)),
        };

        let snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| CrawlError::Checkpoint(format!("Corrupt checkpoint {}: {e}", path.display())))?;
        Ok(Some(snapshot))
    }
}

fn checkpoint_error(action: &str, path: &Path, e: std::io::Error) -> CrawlError {
    CrawlError::Checkpoint(format!("Failed to {action} {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> CheckpointSnapshot {
        CheckpointSnapshot::new(
            CheckpointStage::Listing,
            vec![Locale::En],
            vec![
                EntityRecord::new("/names/a").with_name(Locale::En, "Alice"),
                EntityRecord::new("/names/b").with_name(Locale::En, "Bob"),
            ],
        )
    }

    #[tokio::test]
    async fn save_then_load_preserves_order_and_fields() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("temp"), "entities");
        let snapshot = sample();

        let path = store.save(&snapshot).await.unwrap();
        assert!(path.ends_with("entities.json"));

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn missing_checkpoint_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path(), "entities");
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_checkpoint_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path(), "entities");
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.load().await, Err(CrawlError::Checkpoint(_))));
    }

    #[test]
    fn listing_complete_needs_every_locale() {
        let mut snapshot = sample();
        assert!(!snapshot.listing_complete());
        snapshot.completed_locales = Locale::ALL.to_vec();
        assert!(snapshot.listing_complete());
    }
}
