//! Saved-output tools: reload a JSON archive, replay it through the sinks,
//! and diff two archives by identifier.

use futures::StreamExt;
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;
use tracing::info;

use super::EntityStream;
use crate::domain::{CrawlError, CrawlResult, EntityRecord};

/// Read a JSON array of entities written by a previous run
pub async fn load_archive(path: &Path) -> CrawlResult<Vec<EntityRecord>> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| CrawlError::Output(format!("Failed to read archive {}: {e}", path.display())))?;
    let records: Vec<EntityRecord> = serde_json::from_slice(&bytes)
        .map_err(|e| CrawlError::Output(format!("Invalid archive {}: {e}", path.display())))?;
    info!("Loaded {} entities from {}", records.len(), path.display());
    Ok(records)
}

/// Same `(entity, total)` stream shape as a live crawl, without any network access
pub fn replay(records: Vec<EntityRecord>) -> EntityStream {
    let total = records.len();
    futures::stream::iter(records.into_iter().map(move |record| Ok((record, total)))).boxed()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveDiff {
    /// Identifiers only in the newer archive, in its order
    pub added: Vec<String>,
    /// Identifiers only in the older archive, in its order
    pub removed: Vec<String>,
    pub unchanged: usize,
}

impl ArchiveDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub fn compare(old: &[EntityRecord], new: &[EntityRecord]) -> ArchiveDiff {
    let old_ids: HashSet<&str> = old.iter().map(|r| r.identifier.as_str()).collect();
    let new_ids: HashSet<&str> = new.iter().map(|r| r.identifier.as_str()).collect();

    let mut seen = HashSet::new();
    let added = new
        .iter()
        .map(|r| r.identifier.as_str())
        .filter(|id| !old_ids.contains(id) && seen.insert(*id))
        .map(str::to_string)
        .collect();

    seen.clear();
    let removed = old
        .iter()
        .map(|r| r.identifier.as_str())
        .filter(|id| !new_ids.contains(id) && seen.insert(*id))
        .map(str::to_string)
        .collect();

    ArchiveDiff {
        added,
        removed,
        unchanged: old_ids.intersection(&new_ids).count(),
    }
}
