//! # Entity Detail Fetcher
//!
//! HTTP-backed detail collaborators: locale titles for backfill and the
//! ordered sub-records for enrichment.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{CrawlResult, DetailRecord, DetailTitleSource, EntityRecord, Locale, SubRecordSource};
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::parsing::DetailPageParser;

pub struct HttpDetailFetcher {
    client: Arc<HttpClient>,
    parser: DetailPageParser,
    entity_path: String,
}

impl HttpDetailFetcher {
    pub fn new(client: Arc<HttpClient>, parser: DetailPageParser, entity_path: impl Into<String>) -> Self {
        Self {
            client,
            parser,
            entity_path: entity_path.into(),
        }
    }
}

#[async_trait]
impl DetailTitleSource for HttpDetailFetcher {
    async fn fetch_detail_title(&self, identifier: &str, locale: Locale) -> CrawlResult<Option<String>> {
        let url = locale.localize_url(identifier, &self.entity_path);
        let page = self.client.fetch(&url).await?;
        if !page.is_ok() {
            warn!("Detail page {} answered {}; treating title as missing", url, page.status);
            return Ok(None);
        }
        Ok(self.parser.parse_title(&page.body))
    }
}

#[async_trait]
impl SubRecordSource for HttpDetailFetcher {
    async fn list_detail_identifiers(&self, entity: &EntityRecord) -> CrawlResult<Vec<String>> {
        let page = self.client.fetch_ok(&entity.identifier).await?;
        let links = self.parser.parse_detail_links(&page.body, &entity.identifier)?;
        debug!("{} has {} detail pages", entity.identifier, links.len());
        Ok(links)
    }

    async fn fetch_detail_record(&self, identifier: &str) -> CrawlResult<DetailRecord> {
        let page = self.client.fetch_ok(identifier).await?;
        Ok(self.parser.parse_sub_record(identifier, &page.body))
    }
}
