//! Search-results extraction.

use scraper::{Html, Selector};
use std::sync::LazyLock;

use super::SearchResult;

static RESULT_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.page-item-detail.manga").unwrap());

static TITLE_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3.h5 a").unwrap());

/// Builds the search endpoint URL, spaces in the query become hyphens.
pub fn search_url(base_url: &str, search_path: &str, query: &str) -> String {
    let slug = query.trim().split_whitespace().collect::<Vec<_>>().join("-");
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        search_path.trim_matches('/'),
        slug
    )
}

/// Extracts (title, url) candidates from a search-results page,
/// in document order. A page with no result rows yields an empty list.
pub fn parse_search_results(html: &str) -> Vec<SearchResult> {
    let doc = Html::parse_document(html);

    doc.select(&RESULT_ITEM)
        .filter_map(|item| {
            let link = item.select(&TITLE_LINK).next()?;
            let href = link.value().attr("href")?;
            let title = link.text().collect::<String>().trim().to_string();
            if title.is_empty() {
                return None;
            }

            Some(SearchResult {
                title,
                url: href.to_string(),
            })
        })
        .collect()
}
