//! # Listing Coordinator
//!
//! Runs the per-locale listing passes either one after another into a single
//! entity set, or as one worker task per locale.
//!
//! Concurrent runs come in two flavours:
//! - [`Reconciliation::Merged`]: workers only extract; every page's stubs are
//!   sent over a channel to the coordinator, the single writer of the set.
//!   The result has one record per identifier, in arrival order.
//! - [`Reconciliation::Partitioned`]: each worker fills a private set and the
//!   partitions are concatenated in locale order. An entity listed under
//!   several locales appears once per partition, each copy carrying only the
//!   names seen by its worker.
//!
//! A fatal error in any worker ends the whole run; remaining workers are
//! aborted when their `JoinSet` is dropped.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::checkpoint::{CheckpointSnapshot, CheckpointStage, CheckpointStore};
use super::listing_pass::crawl_locale;
use super::scroll_pager::PagerSettings;
use crate::domain::{CrawlError, CrawlResult, EntityRecord, EntitySet, EntityStub, ListingExtractor, Locale, RendererFactory};
use crate::infrastructure::config::Reconciliation;

/// Result of the listing stage
#[derive(Debug, Clone)]
pub enum ListingOutcome {
    Reconciled(EntitySet),
    Partitioned(Vec<(Locale, EntitySet)>),
}

impl ListingOutcome {
    pub fn record_count(&self) -> usize {
        match self {
            Self::Reconciled(set) => set.len(),
            Self::Partitioned(parts) => parts.iter().map(|(_, set)| set.len()).sum(),
        }
    }

    pub fn into_records(self) -> Vec<EntityRecord> {
        match self {
            Self::Reconciled(set) => set.into_records(),
            Self::Partitioned(parts) => parts.into_iter().flat_map(|(_, set)| set.into_records()).collect(),
        }
    }
}

pub struct ListingCoordinator {
    renderers: Arc<dyn RendererFactory>,
    extractor: Arc<dyn ListingExtractor>,
    pager: PagerSettings,
    checkpoints: Option<CheckpointStore>,
}

impl ListingCoordinator {
    pub fn new(renderers: Arc<dyn RendererFactory>, extractor: Arc<dyn ListingExtractor>, pager: PagerSettings) -> Self {
        Self {
            renderers,
            extractor,
            pager,
            checkpoints: None,
        }
    }

    /// Save a `Listing` checkpoint after every completed locale
    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Passes in `Locale::ALL` order over one shared set, skipping `completed`
    pub async fn run_sequential(&self, mut set: EntitySet, mut completed: Vec<Locale>) -> CrawlResult<EntitySet> {
        for locale in Locale::ALL {
            if completed.contains(&locale) {
                info!("Skipping {} listing, already in checkpoint", locale.display_name());
                continue;
            }

            let before = set.len();
            crawl_locale(self.renderers.as_ref(), self.extractor.as_ref(), locale, &self.pager, |stubs| {
                set.merge_all(stubs);
                Ok(())
            })
            .await?;
            info!(
                "{} pass added {} new entities ({} total)",
                locale.display_name(),
                set.len() - before,
                set.len()
            );

            completed.push(locale);
            self.checkpoint(&completed, set.iter().cloned().collect()).await?;
        }
        Ok(set)
    }

    /// One worker per locale, reconciled per `reconciliation`
    pub async fn run_concurrent(&self, reconciliation: Reconciliation) -> CrawlResult<ListingOutcome> {
        let outcome = match reconciliation {
            Reconciliation::Merged => ListingOutcome::Reconciled(self.run_merged().await?),
            Reconciliation::Partitioned => ListingOutcome::Partitioned(self.run_partitioned().await?),
        };
        info!("Concurrent listing collected {} records", outcome.record_count());

        let records = match &outcome {
            ListingOutcome::Reconciled(set) => set.iter().cloned().collect(),
            ListingOutcome::Partitioned(parts) => parts.iter().flat_map(|(_, set)| set.iter().cloned()).collect(),
        };
        self.checkpoint(&Locale::ALL, records).await?;
        Ok(outcome)
    }

    async fn run_merged(&self) -> CrawlResult<EntitySet> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<EntityStub>>();
        let mut workers = JoinSet::new();

        for locale in Locale::ALL {
            let renderers = Arc::clone(&self.renderers);
            let extractor = Arc::clone(&self.extractor);
            let pager = self.pager.clone();
            let tx = tx.clone();
            workers.spawn(async move {
                crawl_locale(renderers.as_ref(), extractor.as_ref(), locale, &pager, |stubs| {
                    tx.send(stubs)
                        .map_err(|_| CrawlError::Worker(format!("{locale} worker lost the merge channel")))
                })
                .await
                .map(|_| locale)
            });
        }
        drop(tx);

        let mut set = EntitySet::new();
        loop {
            tokio::select! {
                Some(stubs) = rx.recv() => {
                    set.merge_all(stubs);
                }
                Some(joined) = workers.join_next() => {
                    let locale = joined.map_err(join_error)??;
                    info!("{} worker finished", locale.display_name());
                }
                else => break,
            }
        }
        Ok(set)
    }

    async fn run_partitioned(&self) -> CrawlResult<Vec<(Locale, EntitySet)>> {
        let mut workers = JoinSet::new();

        for locale in Locale::ALL {
            let renderers = Arc::clone(&self.renderers);
            let extractor = Arc::clone(&self.extractor);
            let pager = self.pager.clone();
            workers.spawn(async move {
                let mut private = EntitySet::new();
                crawl_locale(renderers.as_ref(), extractor.as_ref(), locale, &pager, |stubs| {
                    private.merge_all(stubs);
                    Ok(())
                })
                .await?;
                Ok::<_, CrawlError>((locale, private))
            });
        }

        let mut parts = Vec::with_capacity(Locale::ALL.len());
        while let Some(joined) = workers.join_next().await {
            let (locale, set) = joined.map_err(join_error)??;
            info!("{} worker finished with {} records", locale.display_name(), set.len());
            parts.push((locale, set));
        }
        parts.sort_by_key(|(locale, _)| Locale::ALL.iter().position(|l| l == locale));

        let distinct = EntitySet::from_records(parts.iter().flat_map(|(_, set)| set.iter().cloned())).len();
        let total: usize = parts.iter().map(|(_, set)| set.len()).sum();
        if total > distinct {
            warn!(
                "Partitioned listing holds {} records for {} distinct entities",
                total, distinct
            );
        }
        Ok(parts)
    }

    async fn checkpoint(&self, completed: &[Locale], records: Vec<EntityRecord>) -> CrawlResult<()> {
        if let Some(store) = &self.checkpoints {
            let snapshot = CheckpointSnapshot::new(CheckpointStage::Listing, completed.to_vec(), records);
            store.save(&snapshot).await?;
        }
        Ok(())
    }
}

fn join_error(e: tokio::task::JoinError) -> CrawlError {
    CrawlError::Worker(format!("Listing worker did not complete: {e}"))
}
