//! End-to-end pipeline runs against scripted listings and detail pages
use std::sync::Arc;
use std::time::Duration;

use directory_crawler_lib::application::{
    CheckpointStore, Collaborators, CrawlPipeline, CsvSink, EnrichmentPolicy, EntitySink, JsonArraySink,
    PipelineSettings, persist,
};
use directory_crawler_lib::domain::{DetailRecord, EntityRecord, Locale};
use directory_crawler_lib::infrastructure::{CrawlMode, Reconciliation};
use directory_crawler_lib::test_utils::{
    FakeDetailSource, LineListingExtractor, ScriptedRendererFactory, listing_page, no_delay_pager,
};
use futures::TryStreamExt;
use tempfile::TempDir;

fn settings(dir: &TempDir, mode: CrawlMode, reconciliation: Reconciliation) -> PipelineSettings {
    PipelineSettings {
        mode,
        reconciliation,
        pager: no_delay_pager(),
        enrichment: EnrichmentPolicy {
            retry_count: 1,
            retry_delay: Duration::from_millis(1),
        },
        checkpoints: CheckpointStore::new(dir.path().join("temp"), "entities"),
        resume: false,
    }
}

fn collaborators(factory: ScriptedRendererFactory, details: FakeDetailSource) -> Collaborators {
    let details = Arc::new(details);
    Collaborators {
        renderers: Arc::new(factory),
        extractor: Arc::new(LineListingExtractor),
        titles: details.clone(),
        sub_records: details,
    }
}

/// Every locale name of `record`, in pass order
fn names(record: &EntityRecord) -> [Option<&str>; 3] {
    Locale::ALL.map(|locale| record.name(locale))
}

/// "Alice" in English, absent from the Belarusian listing, "Алиса" in Russian
fn alice_listings() -> ScriptedRendererFactory {
    ScriptedRendererFactory::new()
        .with_pages(Locale::En, vec![listing_page(&[("/names/x", Some("Alice"))])])
        .with_pages(Locale::Be, vec![listing_page(&[])])
        .with_pages(Locale::Ru, vec![listing_page(&[("/names/x", Some("Алиса"))])])
}

fn alice_details() -> FakeDetailSource {
    FakeDetailSource::new()
        .with_detail("/names/x", DetailRecord::new("/names/x/d1").with_field("date", "1901"))
        .with_detail("/names/x", DetailRecord::new("/names/x/d2").with_field("date", "1902"))
}

#[tokio::test]
async fn sequential_run_reconciles_backfills_and_enriches() {
    let dir = TempDir::new().unwrap();
    let details = alice_details();
    let pipeline = CrawlPipeline::new(
        collaborators(alice_listings(), details),
        settings(&dir, CrawlMode::Sequential, Reconciliation::Merged),
    );

    let items: Vec<(EntityRecord, usize)> = pipeline.run().await.unwrap().try_collect().await.unwrap();

    assert_eq!(items.len(), 1);
    let (entity, total) = &items[0];
    assert_eq!(*total, 1);
    assert_eq!(entity.identifier, "/names/x");
    assert_eq!(entity.name(Locale::En), Some("Alice"));
    assert_eq!(entity.name(Locale::Be), Some("N/A (Alice)"));
    assert_eq!(entity.name(Locale::Ru), Some("Алиса"));
    let detail_ids: Vec<_> = entity.details.iter().map(|d| d.identifier.as_str()).collect();
    assert_eq!(detail_ids, ["/names/x/d1", "/names/x/d2"]);
    assert!(!entity.is_partial());
}

#[tokio::test]
async fn first_seen_order_survives_to_the_output_file() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedRendererFactory::new()
        .with_pages(
            Locale::En,
            vec![
                listing_page(&[("/names/c", Some("C"))]),
                listing_page(&[("/names/a", Some("A"))]),
            ],
        )
        .with_pages(Locale::Be, vec![listing_page(&[("/names/b", Some("Б")), ("/names/c", Some("Ц"))])])
        .with_pages(Locale::Ru, vec![listing_page(&[("/names/a", Some("А"))])]);
    let pipeline = CrawlPipeline::new(
        collaborators(factory, FakeDetailSource::new()),
        settings(&dir, CrawlMode::Sequential, Reconciliation::Merged),
    );

    let mut sink = JsonArraySink::new(dir.path().join("entities.json"));
    let report = persist(pipeline.run().await.unwrap(), &mut sink).await.unwrap();

    assert_eq!(report.written, 3);
    let saved: Vec<EntityRecord> = serde_json::from_slice(&std::fs::read(sink.path()).unwrap()).unwrap();
    let order: Vec<_> = saved.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(order, ["/names/c", "/names/a", "/names/b"]);
    assert!(saved.iter().all(|r| r.names.is_complete()));
}

#[tokio::test]
async fn partitioned_concurrency_duplicates_shared_entities() {
    let sequential_dir = TempDir::new().unwrap();
    let sequential = CrawlPipeline::new(
        collaborators(alice_listings(), FakeDetailSource::new()),
        settings(&sequential_dir, CrawlMode::Sequential, Reconciliation::Merged),
    )
    .collect()
    .await
    .unwrap();

    let partitioned_dir = TempDir::new().unwrap();
    let partitioned = CrawlPipeline::new(
        collaborators(alice_listings(), FakeDetailSource::new()),
        settings(&partitioned_dir, CrawlMode::Concurrent, Reconciliation::Partitioned),
    )
    .collect()
    .await
    .unwrap();

    assert_eq!(sequential.len(), 1);
    assert_eq!(partitioned.len(), 2);
    assert!(partitioned.iter().all(|r| r.identifier == "/names/x"));
    assert_eq!(
        names(&partitioned[0]),
        [Some("Alice"), Some("N/A (Alice)"), Some("N/A (Alice)")]
    );
    // The Russian-only copy never saw the English name, so its sentinels reference the identifier
    assert_eq!(
        names(&partitioned[1]),
        [Some("N/A (/names/x)"), Some("N/A (/names/x)"), Some("Алиса")]
    );
}

#[tokio::test]
async fn merged_concurrency_matches_sequential() {
    let dir = TempDir::new().unwrap();
    let records = CrawlPipeline::new(
        collaborators(alice_listings(), FakeDetailSource::new()),
        settings(&dir, CrawlMode::Concurrent, Reconciliation::Merged),
    )
    .collect()
    .await
    .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name(Locale::En), Some("Alice"));
    assert_eq!(records[0].name(Locale::Be), Some("N/A (Alice)"));
    assert_eq!(records[0].name(Locale::Ru), Some("Алиса"));
}

#[tokio::test]
async fn failing_sub_record_yields_partial_entity_and_run_continues() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedRendererFactory::new().with_pages(
        Locale::En,
        vec![listing_page(&[("/names/x", Some("Alice")), ("/names/y", Some("Yan"))])],
    );
    let details = alice_details()
        .with_detail_failures("/names/x/d2", 10)
        .with_detail("/names/y", DetailRecord::new("/names/y/d1"));
    let pipeline = CrawlPipeline::new(
        collaborators(factory, details),
        settings(&dir, CrawlMode::Sequential, Reconciliation::Merged),
    );

    let mut sink = CsvSink::new(dir.path().join("entities.csv"));
    let report = persist(pipeline.run().await.unwrap(), &mut sink).await.unwrap();

    assert_eq!(report.written, 2);
    assert_eq!(report.partial, 1);

    let mut reader = csv::Reader::from_path(sink.path()).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        ["identifier", "name_en", "name_be", "name_ru", "details", "enrichment_error"]
    );
    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(!rows[0][5].is_empty());
    assert!(rows[0][4].contains("/names/x/d1"));
    assert!(rows[1][5].is_empty());
}
