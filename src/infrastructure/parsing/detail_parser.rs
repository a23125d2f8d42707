//! Entity detail page parser
//!
//! Handles the two kinds of detail pages: the entity page itself (title and
//! links to its sub-pages) and each sub-page (one opaque detail record).

use scraper::{Html, Selector};
use std::collections::BTreeMap;
use tracing::warn;
use url::Url;

use super::{ParsingError, ParsingResult, compile_selectors, first_text, resolve_url, select_first_group};
use crate::domain::DetailRecord;
use crate::infrastructure::config::SelectorConfig;

pub struct DetailPageParser {
    title_selectors: Vec<Selector>,
    link_selectors: Vec<Selector>,
    sub_record_title_selectors: Vec<Selector>,
    field_selectors: BTreeMap<String, Selector>,
}

impl DetailPageParser {
    pub fn new(selectors: &SelectorConfig) -> ParsingResult<Self> {
        let mut field_selectors = BTreeMap::new();
        for (field, selector_str) in &selectors.sub_record_fields {
            match Selector::parse(selector_str) {
                Ok(selector) => {
                    field_selectors.insert(field.clone(), selector);
                }
                Err(e) => warn!("Skipping field '{}': invalid selector '{}': {}", field, selector_str, e),
            }
        }

        Ok(Self {
            title_selectors: compile_selectors("detail_title", &selectors.detail_title)?,
            link_selectors: compile_selectors("detail_link", &selectors.detail_link)?,
            sub_record_title_selectors: compile_selectors("sub_record_title", &selectors.sub_record_title)?,
            field_selectors,
        })
    }

    /// Entity title, `None` when the page has no title element
    pub fn parse_title(&self, html: &str) -> Option<String> {
        first_text(&Html::parse_document(html), &self.title_selectors)
    }

    /// Sub-page URLs in document order, without repeats
    pub fn parse_detail_links(&self, html: &str, page_url: &str) -> ParsingResult<Vec<String>> {
        let base = Url::parse(page_url)
            .map_err(|e| ParsingError::url_resolution_failed(page_url, &e.to_string(), None))?;
        let document = Html::parse_document(html);

        let mut links: Vec<String> = Vec::new();
        for element in select_first_group(&document, &self.link_selectors) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let url = resolve_url(&base, href)?;
            if !links.contains(&url) {
                links.push(url);
            }
        }
        Ok(links)
    }

    /// One detail record from a sub-page
    pub fn parse_sub_record(&self, identifier: &str, html: &str) -> DetailRecord {
        let document = Html::parse_document(html);

        let mut record = DetailRecord::new(identifier);
        if let Some(title) = first_text(&document, &self.sub_record_title_selectors) {
            record = record.with_title(title);
        }
        for (field, selector) in &self.field_selectors {
            if let Some(value) = first_text(&document, std::slice::from_ref(selector)) {
                record = record.with_field(field.as_str(), value);
            }
        }
        record
    }
}
