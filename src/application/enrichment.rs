//! # Detail Enrichment
//!
//! Walks the entity list in order and attaches each entity's detail
//! sub-records, yielding `(entity, total)` one at a time so progress can be
//! reported and persisted incrementally.
//!
//! A failed attempt is retried with exponential backoff. Details gathered by
//! an attempt are only attached if that attempt finishes, so a retry never
//! duplicates records. Once the retry budget is spent the entity is emitted
//! with the last attempt's partial details and `enrichment_error` set.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use super::EntityStream;
use crate::domain::{CrawlError, DetailRecord, EntityRecord, SubRecordSource};
use crate::infrastructure::config::PipelineConfig;

#[derive(Debug, Clone, Copy)]
pub struct EnrichmentPolicy {
    /// Extra attempts after the first one
    pub retry_count: u32,
    pub retry_delay: Duration,
}

impl EnrichmentPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            retry_count: config.enrichment_retry_count,
            retry_delay: Duration::from_millis(config.enrichment_retry_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for EnrichmentPolicy {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

pub struct Enricher {
    source: Arc<dyn SubRecordSource>,
    policy: EnrichmentPolicy,
}

impl Enricher {
    pub fn new(source: Arc<dyn SubRecordSource>, policy: EnrichmentPolicy) -> Self {
        Self { source, policy }
    }

    /// Enrich a single entity; never fails, a give-up is recorded on the entity
    pub async fn enrich(&self, mut entity: EntityRecord) -> EntityRecord {
        let mut attempt = 0;
        loop {
            let (details, failure) = self.attempt(&entity).await;
            match failure {
                None => {
                    entity.details.extend(details);
                    return entity;
                }
                Some(e) if attempt < self.policy.retry_count => {
                    let delay = self.policy.backoff(attempt);
                    attempt += 1;
                    warn!(
                        "Enrichment of {} failed ({}); retry {}/{} in {:?}",
                        entity.identifier, e, attempt, self.policy.retry_count, delay
                    );
                    sleep(delay).await;
                }
                Some(e) => {
                    let e = CrawlError::Enrichment {
                        identifier: entity.identifier.clone(),
                        message: e.to_string(),
                    };
                    error!("{}; emitting {} partial detail records", e, details.len());
                    entity.details.extend(details);
                    entity.enrichment_error = Some(e.to_string());
                    return entity;
                }
            }
        }
    }

    /// One attempt: every sub-record in listed order, stopping at the first error
    async fn attempt(&self, entity: &EntityRecord) -> (Vec<DetailRecord>, Option<CrawlError>) {
        let identifiers = match self.source.list_detail_identifiers(entity).await {
            Ok(ids) => ids,
            Err(e) => return (Vec::new(), Some(e)),
        };

        let mut details = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            match self.source.fetch_detail_record(&identifier).await {
                Ok(record) => {
                    debug!("Fetched detail {} for {}", identifier, entity.identifier);
                    details.push(record);
                }
                Err(e) => return (details, Some(e)),
            }
        }
        (details, None)
    }

    /// Lazily enrich `records` in order; the next entity is only fetched when pulled
    pub fn into_stream(self, records: Vec<EntityRecord>) -> EntityStream {
        let total = records.len();
        let enricher = Arc::new(self);
        futures::stream::iter(records)
            .then(move |record| {
                let enricher = Arc::clone(&enricher);
                async move { Ok((enricher.enrich(record).await, total)) }
            })
            .boxed()
    }
}
