//! Crawl error taxonomy
//!
//! Errors are split by how the pipeline reacts to them: fatal errors end the
//! run with a distinguishing exit code, recoverable rendering errors are
//! logged and the scroll step is retried.

use thiserror::Error;

use super::locale::Locale;

/// Failure reported by a rendering backend for one scroll step
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("render step timed out after {timeout_secs}s; raise scroll.render_timeout_secs")]
    Timeout { timeout_secs: u64 },

    #[error("scroll script failed: {0}")]
    Script(String),

    #[error("page navigation failed: {0}")]
    Navigation(String),
}

#[derive(Error, Debug, Clone)]
pub enum CrawlError {
    #[error("listing request for {url} returned status {status}")]
    ListingUnavailable { url: String, status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("rendering timed out in {locale} pass at cursor {cursor} ({timeout_secs}s)")]
    RenderTimeout {
        locale: Locale,
        cursor: i64,
        timeout_secs: u64,
    },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("enrichment failed for {identifier}: {message}")]
    Enrichment { identifier: String, message: String },

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("output error: {0}")]
    Output(String),

    #[error("locale worker failed: {0}")]
    Worker(String),
}

impl CrawlError {
    /// Whether the run must stop rather than skip and continue
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Enrichment { .. })
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ListingUnavailable { .. } | Self::Network(_) => 2,
            Self::RenderTimeout { .. } => 3,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for CrawlError {
    fn from(e: std::io::Error) -> Self {
        Self::Output(e.to_string())
    }
}

pub type CrawlResult<T> = Result<T, CrawlError>;
