//! Missing-name backfill
//!
//! After all listing passes, every record with an unset locale name gets one
//! detail-page lookup per missing locale. Unresolvable names become a sentinel
//! so the record always ends up complete.

use tracing::{debug, info};

use crate::domain::{CrawlResult, DetailTitleSource, EntityRecord, Locale, sentinel_name};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Records that had at least one name missing
    pub entities_touched: usize,
    pub resolved: usize,
    pub sentinels: usize,
}

/// Fill every unset name in place, locales in pass order.
///
/// Transport errors from the title source propagate; a page without a
/// title yields the sentinel `N/A (<English name or identifier>)`.
pub async fn backfill_missing_names<'a, I>(records: I, titles: &dyn DetailTitleSource) -> CrawlResult<BackfillReport>
where
    I: IntoIterator<Item = &'a mut EntityRecord>,
{
    let mut report = BackfillReport::default();

    for record in records {
        if record.names.is_complete() {
            continue;
        }
        let missing = record.names.missing();
        report.entities_touched += 1;

        // Only a listed or fetched default-locale name is a valid reference, never a sentinel
        let mut reference = record.name(Locale::DEFAULT).map(str::to_owned);

        for locale in missing {
            let name = match titles.fetch_detail_title(&record.identifier, locale).await? {
                Some(title) => {
                    report.resolved += 1;
                    if locale == Locale::DEFAULT {
                        reference = Some(title.clone());
                    }
                    title
                }
                None => {
                    report.sentinels += 1;
                    sentinel_name(reference.as_deref().unwrap_or(&record.identifier))
                }
            };
            debug!("{} {} = {:?}", record.identifier, locale.field_name(), name);
            record.names.set(locale, name);
        }

        info!("Entity #{} added: {}", report.entities_touched, record);
    }

    info!(
        "Backfill finished: {} entities, {} names resolved, {} sentinels",
        report.entities_touched, report.resolved, report.sentinels
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CrawlError;
    use crate::test_utils::FakeDetailSource;

    #[tokio::test]
    async fn fills_resolvable_and_sentinel_names() {
        let source = FakeDetailSource::new().with_title("/names/a", Locale::Ru, "Алиса");
        let mut records = vec![EntityRecord::new("/names/a").with_name(Locale::En, "Alice")];

        let report = backfill_missing_names(records.iter_mut(), &source).await.unwrap();

        let record = &records[0];
        assert_eq!(record.name(Locale::En), Some("Alice"));
        assert_eq!(record.name(Locale::Be), Some("N/A (Alice)"));
        assert_eq!(record.name(Locale::Ru), Some("Алиса"));
        assert_eq!(
            report,
            BackfillReport {
                entities_touched: 1,
                resolved: 1,
                sentinels: 1
            }
        );
        assert_eq!(
            source.title_requests(),
            vec![("/names/a".to_string(), Locale::Be), ("/names/a".to_string(), Locale::Ru)]
        );
    }

    #[tokio::test]
    async fn sentinel_falls_back_to_identifier_without_english_name() {
        let source = FakeDetailSource::new();
        let mut records = vec![EntityRecord::new("/names/b").with_name(Locale::Ru, "Борис")];

        backfill_missing_names(records.iter_mut(), &source).await.unwrap();

        assert_eq!(records[0].name(Locale::En), Some("N/A (/names/b)"));
        assert_eq!(records[0].name(Locale::Be), Some("N/A (/names/b)"));
        assert_eq!(records[0].name(Locale::Ru), Some("Борис"));
    }

    #[tokio::test]
    async fn fetched_english_title_becomes_the_sentinel_reference() {
        let source = FakeDetailSource::new().with_title("/names/e", Locale::En, "Eve");
        let mut records = vec![EntityRecord::new("/names/e")];

        backfill_missing_names(records.iter_mut(), &source).await.unwrap();

        assert_eq!(records[0].name(Locale::En), Some("Eve"));
        assert_eq!(records[0].name(Locale::Be), Some("N/A (Eve)"));
        assert_eq!(records[0].name(Locale::Ru), Some("N/A (Eve)"));
    }

    #[tokio::test]
    async fn complete_records_are_not_fetched() {
        let source = FakeDetailSource::new();
        let mut records = vec![EntityRecord::new("/names/c")
            .with_name(Locale::En, "C")
            .with_name(Locale::Be, "Ц")
            .with_name(Locale::Ru, "Ц")];

        let report = backfill_missing_names(records.iter_mut(), &source).await.unwrap();

        assert_eq!(report, BackfillReport::default());
        assert!(source.title_requests().is_empty());
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let source = FakeDetailSource::new().with_title_failure("/names/d");
        let mut records = vec![EntityRecord::new("/names/d")];

        let result = backfill_missing_names(records.iter_mut(), &source).await;
        assert!(matches!(result, Err(CrawlError::Network(_))));
    }
}
