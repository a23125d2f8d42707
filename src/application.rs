//! Application layer
//!
//! Orchestrates the crawl: listing passes and their reconciliation, name
//! backfill, detail enrichment, checkpoints and output.

pub mod archive;
pub mod backfill;
pub mod checkpoint;
pub mod coordinator;
pub mod enrichment;
pub mod listing_pass;
pub mod output;
pub mod pipeline;
pub mod scroll_pager;

use futures::stream::BoxStream;

use crate::domain::{CrawlResult, EntityRecord};

/// Entities yielded one at a time, each paired with the total count
pub type EntityStream = BoxStream<'static, CrawlResult<(EntityRecord, usize)>>;

// Re-export commonly used items
pub use archive::{ArchiveDiff, compare, load_archive, replay};
pub use backfill::{BackfillReport, backfill_missing_names};
pub use checkpoint::{CheckpointSnapshot, CheckpointStage, CheckpointStore};
pub use coordinator::{ListingCoordinator, ListingOutcome};
pub use enrichment::{Enricher, EnrichmentPolicy};
pub use listing_pass::{LocalePassStats, crawl_locale};
pub use output::{CsvSink, EntitySink, JsonArraySink, PersistReport, open_sink, output_path, persist};
pub use pipeline::{Collaborators, CrawlPipeline, PipelineSettings};
pub use scroll_pager::{PagerSettings, ScrollPager};
