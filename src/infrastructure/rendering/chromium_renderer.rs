//! Headless Chromium scroll renderer

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ScrollReport;
use crate::domain::{CrawlError, CrawlResult, Locale, RenderError, RendererFactory, ScrollRenderer, ScrollStep, StepOutcome};
use crate::infrastructure::config::ScrollConfig;
use crate::infrastructure::http_client::HttpClient;

pub struct ChromiumRenderer {
    page: Page,
    render_timeout: Duration,
    settle_sleep: Duration,
}

#[async_trait]
impl ScrollRenderer for ChromiumRenderer {
    async fn render_step(&mut self, step: &ScrollStep) -> Result<StepOutcome, RenderError> {
        let timeout_secs = self.render_timeout.as_secs();
        let evaluation = tokio::time::timeout(self.render_timeout, self.page.evaluate(step.script()))
            .await
            .map_err(|_| RenderError::Timeout { timeout_secs })?
            .map_err(|e| RenderError::Script(e.to_string()))?;
        let report: ScrollReport = evaluation
            .into_value()
            .map_err(|e| RenderError::Script(e.to_string()))?;

        tokio::time::sleep(self.settle_sleep).await;

        let html = self
            .page
            .content()
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        Ok(StepOutcome {
            reached_bottom: report.reached_bottom(),
            scroll_offset: report.coordinates,
            html,
        })
    }
}

/// One headless browser shared by every locale session
pub struct ChromiumRendererFactory {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    client: Arc<HttpClient>,
    base_url: String,
    render_timeout: Duration,
    settle_sleep: Duration,
}

impl ChromiumRendererFactory {
    pub async fn launch(client: Arc<HttpClient>, base_url: impl Into<String>, scroll: &ScrollConfig) -> anyhow::Result<Self> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid browser config: {}", e))?;
        let (browser, mut handler) = Browser::launch(config).await?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });
        info!("Headless browser launched");

        Ok(Self {
            browser: Arc::new(browser),
            handler,
            client,
            base_url: base_url.into(),
            render_timeout: scroll.render_timeout(),
            settle_sleep: scroll.settle_sleep(),
        })
    }
}

impl Drop for ChromiumRendererFactory {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl RendererFactory for ChromiumRendererFactory {
    async fn open(&self, locale: Locale) -> CrawlResult<Box<dyn ScrollRenderer>> {
        let url = locale.listing_url(&self.base_url);
        // Status check first; the browser does not surface it
        self.client.fetch_ok(&url).await?;

        let page = self
            .browser
            .new_page(url.as_str())
            .await
            .map_err(|e| CrawlError::Network(format!("Failed to open {url} in browser: {e}")))?;
        debug!("Opened browser page for {}", url);

        Ok(Box::new(ChromiumRenderer {
            page,
            render_timeout: self.render_timeout,
            settle_sleep: self.settle_sleep,
        }))
    }
}
