//! # Output Sinks
//!
//! Entities are persisted one at a time as the enrichment stream yields
//! them, so an interrupted run keeps everything written so far.
//!
//! - [`JsonArraySink`] rewrites the whole array on every entity through a
//!   temporary file, so the file on disk is always a valid JSON array.
//! - [`CsvSink`] appends rows. The header is taken from the first row and
//!   written once; later rows are projected onto it, missing fields become
//!   empty cells and an unknown field is an error.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use futures::StreamExt;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::EntityStream;
use crate::domain::{CrawlError, CrawlResult, EntityRecord};
use crate::infrastructure::config::OutputFormat;

/// `<dir>/<prefix>_<YYYY.MM.DD__HH-MM>.<ext>`
pub fn output_path(dir: &Path, prefix: &str, format: OutputFormat, now: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "{}_{}.{}",
        prefix,
        now.format("%Y.%m.%d__%H-%M"),
        format.extension()
    ))
}

#[async_trait]
pub trait EntitySink: Send {
    fn path(&self) -> &Path;

    async fn write(&mut self, record: &EntityRecord) -> CrawlResult<()>;

    async fn finish(&mut self) -> CrawlResult<()> {
        Ok(())
    }
}

/// Build the sink for `format` at `path`
pub async fn open_sink(format: OutputFormat, path: PathBuf) -> CrawlResult<Box<dyn EntitySink>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    Ok(match format {
        OutputFormat::Json => Box::new(JsonArraySink::new(path)),
        OutputFormat::Csv => Box::new(CsvSink::new(path)),
    })
}

pub struct JsonArraySink {
    path: PathBuf,
    records: Vec<EntityRecord>,
}

impl JsonArraySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    async fn flush(&self) -> CrawlResult<()> {
        let json = serde_json::to_vec_pretty(&self.records)
            .map_err(|e| CrawlError::Output(format!("Failed to serialize entities: {e}")))?;
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        fs::write(&temp, json).await?;
        fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl EntitySink for JsonArraySink {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&mut self, record: &EntityRecord) -> CrawlResult<()> {
        self.records.push(record.clone());
        self.flush().await
    }

    async fn finish(&mut self) -> CrawlResult<()> {
        // An empty run still leaves a valid (empty) array behind
        if self.records.is_empty() {
            self.flush().await?;
        }
        Ok(())
    }
}

pub struct CsvSink {
    path: PathBuf,
    header: Option<Vec<String>>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            header: None,
        }
    }

    pub async fn write_row(&mut self, row: &IndexMap<String, String>) -> CrawlResult<()> {
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());

        let header = match &self.header {
            Some(header) => header.clone(),
            None => {
                let header: Vec<String> = row.keys().cloned().collect();
                writer.write_record(&header).map_err(csv_error)?;
                header
            }
        };

        let unknown: Vec<&str> = row
            .keys()
            .filter(|k| !header.contains(*k))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(CrawlError::Output(format!(
                "Row has fields not in the CSV header: {}",
                unknown.join(", ")
            )));
        }

        let cells = header.iter().map(|column| row.get(column).map(String::as_str).unwrap_or_default());
        writer.write_record(cells).map_err(csv_error)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| CrawlError::Output(format!("Failed to encode CSV row: {e}")))?;

        // The first row starts the file over so a stale file never ends up with two headers
        let mut options = OpenOptions::new();
        options.create(true);
        if self.header.is_some() {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let mut file = options.open(&self.path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        self.header = Some(header);
        Ok(())
    }
}

#[async_trait]
impl EntitySink for CsvSink {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&mut self, record: &EntityRecord) -> CrawlResult<()> {
        self.write_row(&record.to_row()).await
    }
}

fn csv_error(e: csv::Error) -> CrawlError {
    CrawlError::Output(format!("Failed to encode CSV row: {e}"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub written: usize,
    pub total: usize,
    pub partial: usize,
}

/// Drain `entities` into `sink`, one write per entity, logging `count/total`
pub async fn persist(mut entities: EntityStream, sink: &mut dyn EntitySink) -> CrawlResult<PersistReport> {
    let mut report = PersistReport::default();
    info!("Start saving entities to {}", sink.path().display());

    while let Some(item) = entities.next().await {
        let (record, total) = item?;
        sink.write(&record).await?;
        report.written += 1;
        report.total = total;
        if record.is_partial() {
            report.partial += 1;
        }
        info!("{}/{} Entity {} executed", report.written, total, record.display_name());
    }

    sink.finish().await?;
    info!(
        "Saved {} entities ({} partial) to {}",
        report.written,
        report.partial,
        sink.path().display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Locale;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn row(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn output_name_uses_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        let path = output_path(Path::new("out"), "entities", OutputFormat::Csv, now);
        assert_eq!(path, Path::new("out").join("entities_2024.03.09__07-05.csv"));
    }

    #[tokio::test]
    async fn json_sink_is_valid_after_every_write() {
        let dir = TempDir::new().unwrap();
        let mut sink = JsonArraySink::new(dir.path().join("out.json"));

        sink.write(&EntityRecord::new("/names/a").with_name(Locale::En, "Alice")).await.unwrap();
        let first: Vec<EntityRecord> = serde_json::from_slice(&std::fs::read(sink.path()).unwrap()).unwrap();
        assert_eq!(first.len(), 1);

        sink.write(&EntityRecord::new("/names/b")).await.unwrap();
        let second: Vec<EntityRecord> = serde_json::from_slice(&std::fs::read(sink.path()).unwrap()).unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].name(Locale::En), Some("Alice"));
    }

    #[tokio::test]
    async fn csv_header_written_once_and_missing_fields_padded() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvSink::new(dir.path().join("out.csv"));

        sink.write_row(&row(&[("identifier", "/a"), ("name_en", "Alice")])).await.unwrap();
        sink.write_row(&row(&[("identifier", "/b")])).await.unwrap();

        let text = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(text, "identifier,name_en\n/a,Alice\n/b,\n");
    }

    #[tokio::test]
    async fn csv_sink_replaces_an_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "identifier\n/old\n").unwrap();

        let mut sink = CsvSink::new(&path);
        sink.write_row(&row(&[("identifier", "/a")])).await.unwrap();
        sink.write_row(&row(&[("identifier", "/b")])).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "identifier\n/a\n/b\n");
    }

    #[tokio::test]
    async fn csv_rejects_fields_outside_header() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvSink::new(dir.path().join("out.csv"));

        sink.write_row(&row(&[("identifier", "/a")])).await.unwrap();
        let err = sink
            .write_row(&row(&[("identifier", "/b"), ("extra", "x")]))
            .await
            .unwrap_err();

        assert!(matches!(err, CrawlError::Output(msg) if msg.contains("extra")));
        let text = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(text, "identifier\n/a\n");
    }

    #[tokio::test]
    async fn persist_counts_partial_entities() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvSink::new(dir.path().join("out.csv"));
        let mut partial = EntityRecord::new("/names/b");
        partial.enrichment_error = Some("gave up".into());
        let items: Vec<CrawlResult<(EntityRecord, usize)>> =
            vec![Ok((EntityRecord::new("/names/a"), 2)), Ok((partial, 2))];
        let stream = futures::stream::iter(items).boxed();

        let report = persist(stream, &mut sink).await.unwrap();

        assert_eq!(report, PersistReport { written: 2, total: 2, partial: 1 });
        let text = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("gave up"));
    }
}
