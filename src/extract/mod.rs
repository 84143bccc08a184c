//! HTML extraction for search results, manga details, and chapter pages.
//!
//! All extractors are pure functions over fetched HTML. They follow one
//! page-structure contract (a Madara-style webtoon catalog); this is not
//! a generic crawler.

mod catalog;
mod details;
mod images;

pub use catalog::{parse_search_results, search_url};
pub use details::parse_manga_details;
pub use images::parse_chapter_images;

/// One row of a search-results page, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Manga title.
    pub title: String,

    /// URL of the manga's detail page.
    pub url: String,
}

/// A single chapter of a manga.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    /// Chapter display title as shown on the page.
    pub title: String,

    /// URL of the chapter's reading page.
    pub url: String,

    /// Sort and selection key. `-1.0` marks an unnumbered chapter,
    /// which sorts before everything else. Side stories receive
    /// synthesized numbers strictly after all main chapters.
    pub number: f64,

    /// True for "Side Story N" bonus chapters.
    pub is_side_story: bool,
}

impl Chapter {
    /// Renders `number` without a trailing `.0` for whole numbers.
    pub fn display_number(&self) -> String {
        if self.number.fract() == 0.0 {
            format!("{}", self.number as i64)
        } else {
            format!("{}", self.number)
        }
    }
}

/// A manga's title and its chapter list, sorted ascending by number.
#[derive(Debug, Clone, PartialEq)]
pub struct MangaDetails {
    /// Manga title with badge markup stripped.
    pub title: String,

    /// Chapters in globally ascending `number` order.
    pub chapters: Vec<Chapter>,
}
