//! # Scroll-Paginated Fetcher
//!
//! Drives one locale's infinite-scroll listing to completion as an explicit
//! pull iterator. Each pull issues scroll steps until one succeeds; the
//! step that reports the document bottom produces the last snapshot.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use crate::domain::{CrawlError, CrawlResult, Locale, PageSnapshot, RenderError, ScrollRenderer, ScrollStep};
use crate::infrastructure::config::ScrollConfig;

/// Cursor of the first step; one before the origin so the unscrolled page comes first
pub const INITIAL_CURSOR: i64 = -1;

#[derive(Debug, Clone)]
pub struct PagerSettings {
    pub steps_per_render: u32,
    pub step_height: u32,
    pub render_timeout_secs: u64,
    pub start_delay_ms: (u64, u64),
    pub max_consecutive_failures: Option<u32>,
}

impl From<&ScrollConfig> for PagerSettings {
    fn from(config: &ScrollConfig) -> Self {
        Self {
            steps_per_render: config.steps_per_render,
            step_height: config.step_height,
            render_timeout_secs: config.render_timeout_secs,
            start_delay_ms: (config.start_delay_min_ms, config.start_delay_max_ms),
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }
}

impl Default for PagerSettings {
    fn default() -> Self {
        Self::from(&ScrollConfig::default())
    }
}

/// Lazy, finite, non-restartable sequence of listing snapshots
pub struct ScrollPager {
    renderer: Box<dyn ScrollRenderer>,
    locale: Locale,
    settings: PagerSettings,
    cursor: i64,
    started: bool,
    finished: bool,
    consecutive_failures: u32,
}

impl ScrollPager {
    pub fn new(renderer: Box<dyn ScrollRenderer>, locale: Locale, settings: PagerSettings) -> Self {
        Self {
            renderer,
            locale,
            settings,
            cursor: INITIAL_CURSOR,
            started: false,
            finished: false,
            consecutive_failures: 0,
        }
    }

    /// Next snapshot, `Ok(None)` once the bottom snapshot has been yielded.
    ///
    /// A rendering timeout is returned as a fatal error. Other rendering
    /// errors are logged and the same cursor is re-issued; without a
    /// configured failure cap this retries for as long as the fault lasts.
    pub async fn next_snapshot(&mut self) -> CrawlResult<Option<PageSnapshot>> {
        if self.finished {
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            pace(self.settings.start_delay_ms).await;
            info!("Start scrolling in {}...", self.locale.display_name());
        }

        loop {
            let step = ScrollStep {
                cursor: self.cursor,
                steps: self.settings.steps_per_render,
                step_height: self.settings.step_height,
            };

            match self.renderer.render_step(&step).await {
                Ok(outcome) => {
                    self.consecutive_failures = 0;
                    self.cursor += 1;
                    info!(
                        "Scrolling {} {}: offset={}, bottom={}",
                        self.locale.code(),
                        step.cursor,
                        outcome.scroll_offset,
                        outcome.reached_bottom
                    );
                    if outcome.reached_bottom {
                        self.finished = true;
                    }
                    return Ok(Some(PageSnapshot {
                        locale: self.locale,
                        cursor: step.cursor,
                        scroll_offset: outcome.scroll_offset,
                        reached_bottom: outcome.reached_bottom,
                        html: outcome.html,
                    }));
                }
                Err(RenderError::Timeout { timeout_secs }) => {
                    self.finished = true;
                    return Err(CrawlError::RenderTimeout {
                        locale: self.locale,
                        cursor: step.cursor,
                        timeout_secs,
                    });
                }
                Err(e) => {
                    self.consecutive_failures += 1;
                    error!(
                        "Scroll step {} in {} failed (attempt {}): {}",
                        step.cursor,
                        self.locale.display_name(),
                        self.consecutive_failures,
                        e
                    );
                    if let Some(max) = self.settings.max_consecutive_failures {
                        if self.consecutive_failures >= max {
                            self.finished = true;
                            return Err(CrawlError::Extraction(format!(
                                "{} scroll step {} failed {} times in a row: {}",
                                self.locale.display_name(),
                                step.cursor,
                                self.consecutive_failures,
                                e
                            )));
                        }
                    }
                }
            }
        }
    }
}

/// Randomized delay before the first step
async fn pace((min, max): (u64, u64)) {
    if max == 0 {
        return;
    }
    let delay = fastrand::u64(min..=max);
    sleep(Duration::from_millis(delay)).await;
}
