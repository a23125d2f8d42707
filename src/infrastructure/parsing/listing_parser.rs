//! Listing page parser
//!
//! Extracts entity stubs (canonical identifier + locale name) from a
//! rendered listing page, in document order.

use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::{ParsingError, ParsingResult, compile_selectors, element_text, resolve_url, select_first_group};
use crate::domain::{EntityStub, ListingExtractor, Locale, PageSnapshot};
use crate::infrastructure::config::{SelectorConfig, SiteConfig};

/// Parser for entity links on listing pages
pub struct ListingParser {
    link_selectors: Vec<Selector>,
    base_url: Url,
    entity_path: String,
}

impl ListingParser {
    pub fn new(selectors: &SelectorConfig, site: &SiteConfig) -> ParsingResult<Self> {
        let base_url = Url::parse(&site.base_url)
            .map_err(|e| ParsingError::url_resolution_failed(&site.base_url, &e.to_string(), None))?;

        Ok(Self {
            link_selectors: compile_selectors("listing_link", &selectors.listing_link)?,
            base_url,
            entity_path: site.entity_path.clone(),
        })
    }

    /// Identifier shared by every locale: the locale prefix is stripped from
    /// localized links (`/be/names/x` -> `/names/x`).
    fn canonical_identifier(&self, url: &str, locale: Locale) -> String {
        let prefix = locale.path_prefix();
        if prefix.is_empty() {
            return url.to_string();
        }
        let localized = format!("{}{}", prefix, self.entity_path);
        url.replacen(&localized, &self.entity_path, 1)
    }
}

impl ListingExtractor for ListingParser {
    fn extract_stubs(&self, page: &PageSnapshot) -> Vec<EntityStub> {
        let html = Html::parse_document(&page.html);
        let links = select_first_group(&html, &self.link_selectors);

        let mut stubs = Vec::with_capacity(links.len());
        for link in links {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let url = match resolve_url(&self.base_url, href) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Skipping listing link on {} page: {}", page.locale.display_name(), e);
                    continue;
                }
            };
            stubs.push(EntityStub::new(
                self.canonical_identifier(&url, page.locale),
                page.locale,
                element_text(&link),
            ));
        }

        debug!(
            "Extracted {} stubs from {} page at cursor {}",
            stubs.len(),
            page.locale.display_name(),
            page.cursor
        );
        stubs
    }
}
