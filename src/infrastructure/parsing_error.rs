//! Parsing error types for listing and detail page extraction

use thiserror::Error;

use crate::domain::CrawlError;

#[derive(Error, Debug, Clone)]
pub enum ParsingError {
    #[error("No valid selectors compiled for {group}: {errors}")]
    NoValidSelectors { group: String, errors: String },

    #[error("URL resolution failed: {url} - {reason}")]
    UrlResolutionFailed {
        url: String,
        reason: String,
        base_url: Option<String>,
    },
}

impl ParsingError {
    pub fn url_resolution_failed(url: &str, reason: &str, base_url: Option<&str>) -> Self {
        Self::UrlResolutionFailed {
            url: url.to_string(),
            reason: reason.to_string(),
            base_url: base_url.map(ToString::to_string),
        }
    }
}

impl From<ParsingError> for CrawlError {
    fn from(e: ParsingError) -> Self {
        CrawlError::Extraction(e.to_string())
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
