//! Test utilities for the directory crawler
//!
//! Scripted stand-ins for every collaborator the pipeline talks to, so the
//! listing, backfill and enrichment stages can be exercised without a
//! browser or network.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::application::PagerSettings;
use crate::domain::{
    CrawlError, CrawlResult, DetailRecord, DetailTitleSource, EntityRecord, EntityStub, ListingExtractor, Locale,
    PageSnapshot, RenderError, RendererFactory, ScrollRenderer, ScrollStep, StepOutcome, SubRecordSource,
};

type StepScript = Vec<Result<StepOutcome, RenderError>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pager settings without the randomized start delay
pub fn no_delay_pager() -> PagerSettings {
    PagerSettings {
        start_delay_ms: (0, 0),
        ..PagerSettings::default()
    }
}

/// Renderer that replays a fixed list of step outcomes
pub struct ScriptedRenderer {
    script: VecDeque<Result<StepOutcome, RenderError>>,
    cursors: Arc<Mutex<Vec<i64>>>,
}

impl ScriptedRenderer {
    pub fn new(script: StepScript) -> Self {
        Self {
            script: script.into(),
            cursors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// One successful step per page; the last one reports the bottom
    pub fn pages(pages: &[&str]) -> Self {
        Self::new(page_script(pages.iter().map(|p| p.to_string()).collect()))
    }

    pub fn page(html: &str, reached_bottom: bool) -> Result<StepOutcome, RenderError> {
        Ok(StepOutcome {
            reached_bottom,
            scroll_offset: 0.0,
            html: html.to_string(),
        })
    }

    /// Cursors of every step received, in order
    pub fn cursors(&self) -> Arc<Mutex<Vec<i64>>> {
        Arc::clone(&self.cursors)
    }
}

#[async_trait]
impl ScrollRenderer for ScriptedRenderer {
    async fn render_step(&mut self, step: &ScrollStep) -> Result<StepOutcome, RenderError> {
        lock(&self.cursors).push(step.cursor);
        self.script
            .pop_front()
            .unwrap_or_else(|| ScriptedRenderer::page("", true))
    }
}

fn page_script(pages: Vec<String>) -> StepScript {
    let last = pages.len().saturating_sub(1);
    pages
        .into_iter()
        .enumerate()
        .map(|(i, html)| ScriptedRenderer::page(&html, i == last))
        .collect()
}

/// Per-locale scripted listings; unscripted locales render one empty bottom page
#[derive(Default)]
pub struct ScriptedRendererFactory {
    scripts: HashMap<Locale, StepScript>,
    unavailable: HashMap<Locale, u16>,
    opened: Arc<Mutex<Vec<Locale>>>,
}

impl ScriptedRendererFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(self, locale: Locale, pages: Vec<String>) -> Self {
        self.with_script(locale, page_script(pages))
    }

    pub fn with_script(mut self, locale: Locale, script: StepScript) -> Self {
        self.scripts.insert(locale, script);
        self
    }

    /// Initial listing request for `locale` answers `status`
    pub fn with_unavailable(mut self, locale: Locale, status: u16) -> Self {
        self.unavailable.insert(locale, status);
        self
    }

    /// Locales opened so far, in order
    pub fn opened(&self) -> Arc<Mutex<Vec<Locale>>> {
        Arc::clone(&self.opened)
    }
}

#[async_trait]
impl RendererFactory for ScriptedRendererFactory {
    async fn open(&self, locale: Locale) -> CrawlResult<Box<dyn ScrollRenderer>> {
        lock(&self.opened).push(locale);
        if let Some(status) = self.unavailable.get(&locale) {
            return Err(CrawlError::ListingUnavailable {
                url: locale.listing_url("https://example.org"),
                status: *status,
            });
        }
        let script = self.scripts.get(&locale).cloned().unwrap_or_default();
        Ok(Box::new(ScriptedRenderer::new(script)))
    }
}

/// Listing page in the line format read by [`LineListingExtractor`]
pub fn listing_page(entries: &[(&str, Option<&str>)]) -> String {
    entries
        .iter()
        .map(|(identifier, name)| match name {
            Some(name) => format!("{identifier}|{name}"),
            None => identifier.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads one `identifier|name` entry per line; a line without `|` has no name
pub struct LineListingExtractor;

impl ListingExtractor for LineListingExtractor {
    fn extract_stubs(&self, page: &PageSnapshot) -> Vec<EntityStub> {
        page.html
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match line.split_once('|') {
                Some((identifier, name)) => EntityStub::new(identifier, page.locale, Some(name.to_string())),
                None => EntityStub::new(line, page.locale, None),
            })
            .collect()
    }
}

/// In-memory detail pages for backfill and enrichment
#[derive(Default)]
pub struct FakeDetailSource {
    titles: HashMap<(String, Locale), String>,
    failing_titles: HashSet<String>,
    title_requests: Mutex<Vec<(String, Locale)>>,
    details: HashMap<String, Vec<DetailRecord>>,
    detail_failures: Mutex<HashMap<String, u32>>,
    detail_requests: Mutex<Vec<String>>,
}

impl FakeDetailSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, identifier: &str, locale: Locale, title: &str) -> Self {
        self.titles.insert((identifier.to_string(), locale), title.to_string());
        self
    }

    /// Every title lookup for `identifier` fails with a network error
    pub fn with_title_failure(mut self, identifier: &str) -> Self {
        self.failing_titles.insert(identifier.to_string());
        self
    }

    /// Append a sub-record to `entity`'s detail list
    pub fn with_detail(mut self, entity: &str, record: DetailRecord) -> Self {
        self.details.entry(entity.to_string()).or_default().push(record);
        self
    }

    /// The next `times` fetches of `detail` fail
    pub fn with_detail_failures(self, detail: &str, times: u32) -> Self {
        lock(&self.detail_failures).insert(detail.to_string(), times);
        self
    }

    pub fn title_requests(&self) -> Vec<(String, Locale)> {
        lock(&self.title_requests).clone()
    }

    pub fn detail_requests(&self) -> Vec<String> {
        lock(&self.detail_requests).clone()
    }
}

#[async_trait]
impl DetailTitleSource for FakeDetailSource {
    async fn fetch_detail_title(&self, identifier: &str, locale: Locale) -> CrawlResult<Option<String>> {
        lock(&self.title_requests).push((identifier.to_string(), locale));
        if self.failing_titles.contains(identifier) {
            return Err(CrawlError::Network(format!("connection reset fetching {identifier}")));
        }
        Ok(self.titles.get(&(identifier.to_string(), locale)).cloned())
    }
}

#[async_trait]
impl SubRecordSource for FakeDetailSource {
    async fn list_detail_identifiers(&self, entity: &EntityRecord) -> CrawlResult<Vec<String>> {
        Ok(self
            .details
            .get(&entity.identifier)
            .map(|records| records.iter().map(|r| r.identifier.clone()).collect())
            .unwrap_or_default())
    }

    async fn fetch_detail_record(&self, identifier: &str) -> CrawlResult<DetailRecord> {
        lock(&self.detail_requests).push(identifier.to_string());
        {
            let mut failures = lock(&self.detail_failures);
            if let Some(remaining) = failures.get_mut(identifier).filter(|n| **n > 0) {
                *remaining -= 1;
                return Err(CrawlError::Network(format!("timed out fetching {identifier}")));
            }
        }
        self.details
            .values()
            .flatten()
            .find(|r| r.identifier == identifier)
            .cloned()
            .ok_or_else(|| CrawlError::Extraction(format!("no detail page {identifier}")))
    }
}
