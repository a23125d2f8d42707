//! Infrastructure layer for HTTP, parsing, rendering and process setup
//!
//! This module provides the concrete collaborators the crawl pipeline runs
//! against, plus configuration loading and logging initialization.

pub mod config;
pub mod detail_fetcher;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod parsing_error;
pub mod rendering;

// Re-export commonly used items
pub use config::{AppConfig, CrawlMode, OutputFormat, Reconciliation, RendererKind};
pub use detail_fetcher::HttpDetailFetcher;
pub use http_client::HttpClient;
pub use logging::{LogGuards, init_logging, log_system_info};
pub use parsing::{DetailPageParser, ListingParser, ParsingError, ParsingResult};
pub use rendering::StaticRendererFactory;
