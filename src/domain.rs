//! Domain module - Core crawl entities and rules
//!
//! This module contains the locale model, the entity records reconciled
//! across locale passes, the identifier-keyed entity set and the error
//! taxonomy shared by every layer.

pub mod entity;
pub mod entity_set;
pub mod errors;
pub mod locale;
pub mod services;

// Re-export commonly used items for convenience
pub use entity::{DetailRecord, EntityRecord, EntityStub, LocaleNames, PageSnapshot, sentinel_name};
pub use entity_set::{EntitySet, MergeOutcome};
pub use errors::{CrawlError, CrawlResult, RenderError};
pub use locale::Locale;
pub use services::{
    DetailTitleSource, ListingExtractor, RendererFactory, ScrollRenderer, ScrollStep, StepOutcome,
    SubRecordSource,
};
