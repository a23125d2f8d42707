//! # Crawl Pipeline
//!
//! Listing passes, then missing-name backfill, then the lazy enrichment
//! stream. Checkpoints are written after each completed locale and after
//! backfill; a resumed run picks up from the latest one.

use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::EntityStream;
use super::backfill::backfill_missing_names;
use super::checkpoint::{CheckpointSnapshot, CheckpointStage, CheckpointStore};
use super::coordinator::ListingCoordinator;
use super::enrichment::{Enricher, EnrichmentPolicy};
use super::scroll_pager::PagerSettings;
use crate::domain::{
    CrawlResult, DetailTitleSource, EntityRecord, EntitySet, ListingExtractor, Locale, RendererFactory, SubRecordSource,
};
use crate::infrastructure::config::{AppConfig, CrawlMode, Reconciliation};

/// Everything the pipeline talks to
#[derive(Clone)]
pub struct Collaborators {
    pub renderers: Arc<dyn RendererFactory>,
    pub extractor: Arc<dyn ListingExtractor>,
    pub titles: Arc<dyn DetailTitleSource>,
    pub sub_records: Arc<dyn SubRecordSource>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub mode: CrawlMode,
    pub reconciliation: Reconciliation,
    pub pager: PagerSettings,
    pub enrichment: EnrichmentPolicy,
    pub checkpoints: CheckpointStore,
    pub resume: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig, resume: bool) -> Self {
        Self {
            mode: config.pipeline.mode,
            reconciliation: config.pipeline.reconciliation,
            pager: PagerSettings::from(&config.scroll),
            enrichment: EnrichmentPolicy::from_config(&config.pipeline),
            checkpoints: CheckpointStore::new(
                config.pipeline.checkpoint_dir.clone(),
                config.pipeline.checkpoint_name.clone(),
            ),
            resume,
        }
    }
}

pub struct CrawlPipeline {
    collaborators: Collaborators,
    settings: PipelineSettings,
}

impl CrawlPipeline {
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        Self {
            collaborators,
            settings,
        }
    }

    /// Listing and backfill; returns the complete, un-enriched entity list
    pub async fn collect(&self) -> CrawlResult<Vec<EntityRecord>> {
        let started = Instant::now();
        let store = &self.settings.checkpoints;

        let resumed = if self.settings.resume {
            store.load().await?
        } else {
            None
        };

        if let Some(snapshot) = &resumed {
            info!(
                "Resuming from checkpoint saved {}: stage {:?}, {} entities",
                snapshot.saved_at,
                snapshot.stage,
                snapshot.entities.len()
            );
            if snapshot.stage == CheckpointStage::Backfilled {
                return Ok(snapshot.entities.clone());
            }
        }

        let mut records = self.list(resumed).await?;
        info!("Listing finished with {} entities", records.len());

        backfill_missing_names(records.iter_mut(), self.collaborators.titles.as_ref()).await?;
        store
            .save(&CheckpointSnapshot::new(
                CheckpointStage::Backfilled,
                Locale::ALL.to_vec(),
                records.clone(),
            ))
            .await?;

        info!(
            "{} entities are collected from the site in {:?}",
            records.len(),
            started.elapsed()
        );
        Ok(records)
    }

    /// Collect, then hand back the enrichment stream of `(entity, total)`
    pub async fn run(self) -> CrawlResult<EntityStream> {
        let records = self.collect().await?;
        let enricher = Enricher::new(Arc::clone(&self.collaborators.sub_records), self.settings.enrichment);
        Ok(enricher.into_stream(records))
    }

    async fn list(&self, resumed: Option<CheckpointSnapshot>) -> CrawlResult<Vec<EntityRecord>> {
        let coordinator = ListingCoordinator::new(
            Arc::clone(&self.collaborators.renderers),
            Arc::clone(&self.collaborators.extractor),
            self.settings.pager.clone(),
        )
        .with_checkpoints(self.settings.checkpoints.clone());

        match self.settings.mode {
            CrawlMode::Sequential => {
                let (set, completed) = match resumed {
                    Some(snapshot) => (
                        EntitySet::from_records(snapshot.entities),
                        snapshot.completed_locales,
                    ),
                    None => (EntitySet::new(), Vec::new()),
                };
                Ok(coordinator.run_sequential(set, completed).await?.into_records())
            }
            CrawlMode::Concurrent => match resumed {
                Some(snapshot) if snapshot.listing_complete() => Ok(snapshot.entities),
                _ => Ok(coordinator
                    .run_concurrent(self.settings.reconciliation)
                    .await?
                    .into_records()),
            },
        }
    }
}
