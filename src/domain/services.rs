//! Collaborator interfaces the crawl pipeline is driven through
//!
//! Rendering, listing extraction and detail fetching are provided by the
//! infrastructure layer; tests substitute scripted implementations.

use async_trait::async_trait;

use super::entity::{DetailRecord, EntityRecord, EntityStub, PageSnapshot};
use super::errors::{CrawlResult, RenderError};
use super::locale::Locale;

/// One viewport-advance request issued to a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollStep {
    /// Monotonic scroll cursor; starts at -1 so the unscrolled page is captured first
    pub cursor: i64,
    /// Viewport advances performed by this step
    pub steps: u32,
    /// Pixels per advance
    pub step_height: u32,
}

impl ScrollStep {
    /// Browser script that advances the viewport `steps` times and reports
    /// `{result, coordinates}`; `result` is 1 once the document bottom is visible.
    pub fn script(&self) -> String {
        format!(
            "(function down() {{ let y = {cursor}; \
             for (let i = {steps} * y; i < {steps} * (y + 1); i++) {{ \
             if ((window.scrollY + window.innerHeight) >= document.body.scrollHeight) {{ \
             return {{result: 1, coordinates: window.pageYOffset}}; }} \
             window.scrollTo(0, i * {height}); }} \
             return {{result: 0, coordinates: window.pageYOffset}}; }})()",
            cursor = self.cursor,
            steps = self.steps,
            height = self.step_height,
        )
    }
}

/// What a renderer reports after executing one step
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub reached_bottom: bool,
    pub scroll_offset: f64,
    /// Rendered document after the step
    pub html: String,
}

/// A rendering session on one locale's listing page
#[async_trait]
pub trait ScrollRenderer: Send {
    /// Execute one scroll step; `RenderError::Timeout` is fatal for the run
    async fn render_step(&mut self, step: &ScrollStep) -> Result<StepOutcome, RenderError>;
}

/// Opens a rendering session per locale
#[async_trait]
pub trait RendererFactory: Send + Sync {
    /// Issue the initial listing request; a non-200 answer is fatal
    async fn open(&self, locale: Locale) -> CrawlResult<Box<dyn ScrollRenderer>>;
}

/// Turns a rendered listing page into entity stubs, in page order
pub trait ListingExtractor: Send + Sync {
    fn extract_stubs(&self, page: &PageSnapshot) -> Vec<EntityStub>;
}

/// Resolves an entity's name under one locale from its detail page
#[async_trait]
pub trait DetailTitleSource: Send + Sync {
    /// `Ok(None)` when the page has no title element
    async fn fetch_detail_title(&self, identifier: &str, locale: Locale) -> CrawlResult<Option<String>>;
}

/// Fetches an entity's ordered detail sub-records
#[async_trait]
pub trait SubRecordSource: Send + Sync {
    async fn list_detail_identifiers(&self, entity: &EntityRecord) -> CrawlResult<Vec<String>>;

    async fn fetch_detail_record(&self, identifier: &str) -> CrawlResult<DetailRecord>;
}
