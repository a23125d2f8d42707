//! One locale's listing pass: open the listing, pull snapshots until the
//! bottom, hand each page's stubs to a consumer in page order.

use tracing::info;

use super::scroll_pager::{PagerSettings, ScrollPager};
use crate::domain::{CrawlResult, EntityStub, ListingExtractor, Locale, RendererFactory};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalePassStats {
    pub pages: usize,
    pub stubs: usize,
}

/// Run a full pass for `locale`, feeding stubs to `consume` page by page.
///
/// The consumer decides where stubs go: straight into an entity set, a
/// private per-worker set, or a channel towards a single writer.
pub async fn crawl_locale<F>(
    renderers: &dyn RendererFactory,
    extractor: &dyn ListingExtractor,
    locale: Locale,
    settings: &PagerSettings,
    mut consume: F,
) -> CrawlResult<LocalePassStats>
where
    F: FnMut(Vec<EntityStub>) -> CrawlResult<()> + Send,
{
    let renderer = renderers.open(locale).await?;
    let mut pager = ScrollPager::new(renderer, locale, settings.clone());
    let mut stats = LocalePassStats::default();

    while let Some(snapshot) = pager.next_snapshot().await? {
        let stubs = extractor.extract_stubs(&snapshot);
        stats.pages += 1;
        stats.stubs += stubs.len();
        consume(stubs)?;
    }

    info!(
        "Finished {} listing: {} pages, {} links",
        locale.display_name(),
        stats.pages,
        stats.stubs
    );
    Ok(stats)
}
