//! Directory Crawler - multi-locale directory harvesting
//!
//! Walks a directory site's scroll-paginated listing once per locale,
//! reconciles the entities found into a single set keyed by URL, fills
//! missing locale names from detail pages and streams every entity, with
//! its detail sub-records attached, into a JSON or CSV file.

// Module declarations
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cli::{Cli, run};
