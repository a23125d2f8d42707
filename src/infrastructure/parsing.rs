//! HTML parsing infrastructure
//!
//! Selector-list based extraction for listing pages and entity detail
//! pages. Every selector group holds fallbacks tried in order.

pub mod detail_parser;
pub mod listing_parser;

pub use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
pub use detail_parser::DetailPageParser;
pub use listing_parser::ListingParser;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Compile multiple selector strings into Selector objects
///
/// Invalid selectors are skipped with a warning; the group fails only if
/// nothing compiles.
pub fn compile_selectors(group: &str, selector_strings: &[String]) -> ParsingResult<Vec<Selector>> {
    let mut selectors = Vec::new();
    let mut errors = Vec::new();

    for selector_str in selector_strings {
        match Selector::parse(selector_str) {
            Ok(selector) => selectors.push(selector),
            Err(e) => {
                warn!("Failed to compile selector '{}': {}", selector_str, e);
                errors.push(format!("'{selector_str}': {e}"));
            }
        }
    }

    if selectors.is_empty() {
        return Err(ParsingError::NoValidSelectors {
            group: group.to_string(),
            errors: errors.join(", "),
        });
    }
    if !errors.is_empty() {
        debug!("Some {} selectors failed to compile: {}", group, errors.join(", "));
    }
    Ok(selectors)
}

/// Elements matched by the first selector that matches anything
fn select_first_group<'a>(html: &'a Html, selectors: &[Selector]) -> Vec<ElementRef<'a>> {
    selectors
        .iter()
        .map(|selector| html.select(selector).collect::<Vec<_>>())
        .find(|elements| !elements.is_empty())
        .unwrap_or_default()
}

/// Whitespace-normalized text of an element; `None` when empty
fn element_text(element: &ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!normalized.is_empty()).then_some(normalized)
}

/// Text of the first element any selector matches
fn first_text(html: &Html, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|selector| html.select(selector).next())
        .find_map(|element| element_text(&element))
}

/// Resolve an href against the page it was found on
fn resolve_url(base: &Url, href: &str) -> ParsingResult<String> {
    base.join(href)
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .map_err(|e| ParsingError::url_resolution_failed(href, &e.to_string(), Some(base.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_selectors_are_skipped() {
        let selectors = compile_selectors("test", &["h1".to_string(), "::::".to_string()]).unwrap();
        assert_eq!(selectors.len(), 1);
    }

    #[test]
    fn all_invalid_selectors_fail() {
        let result = compile_selectors("test", &["::::".to_string()]);
        assert!(matches!(result, Err(ParsingError::NoValidSelectors { .. })));
    }

    #[test]
    fn text_is_whitespace_normalized() {
        let html = Html::parse_fragment("<h1>  Alice \n  Smith </h1>");
        let selectors = compile_selectors("title", &["h1".to_string()]).unwrap();
        assert_eq!(first_text(&html, &selectors).as_deref(), Some("Alice Smith"));
    }

    #[test]
    fn relative_links_resolve_without_fragment() {
        let base = Url::parse("https://site.test/be").unwrap();
        assert_eq!(
            resolve_url(&base, "/names/x#top").unwrap(),
            "https://site.test/names/x"
        );
    }
}
