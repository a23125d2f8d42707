//! Rendering backends for the scroll-paginated listing
//!
//! The static backend fetches the listing once over HTTP and reports the
//! bottom immediately; the Chromium backend (`browser` feature) executes
//! the scroll script in a headless page.

#[cfg(feature = "browser")]
pub mod chromium_renderer;

#[cfg(feature = "browser")]
pub use chromium_renderer::ChromiumRendererFactory;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::domain::{CrawlResult, Locale, RenderError, RendererFactory, ScrollRenderer, ScrollStep, StepOutcome};
use crate::infrastructure::http_client::HttpClient;

/// Value returned by the scroll script
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScrollReport {
    pub result: u8,
    #[serde(default)]
    pub coordinates: f64,
}

impl ScrollReport {
    pub fn reached_bottom(&self) -> bool {
        self.result == 1
    }
}

/// HTTP-only renderer; the page never grows past its first response
pub struct StaticRenderer {
    html: String,
}

#[async_trait]
impl ScrollRenderer for StaticRenderer {
    async fn render_step(&mut self, _step: &ScrollStep) -> Result<StepOutcome, RenderError> {
        Ok(StepOutcome {
            reached_bottom: true,
            scroll_offset: 0.0,
            html: self.html.clone(),
        })
    }
}

pub struct StaticRendererFactory {
    client: Arc<HttpClient>,
    base_url: String,
}

impl StaticRendererFactory {
    pub fn new(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RendererFactory for StaticRendererFactory {
    async fn open(&self, locale: Locale) -> CrawlResult<Box<dyn ScrollRenderer>> {
        let url = locale.listing_url(&self.base_url);
        let page = self.client.fetch_ok(&url).await?;
        info!("Opened {} listing: {} ({} chars)", locale.display_name(), url, page.body.len());
        Ok(Box::new(StaticRenderer { html: page.body }))
    }
}
