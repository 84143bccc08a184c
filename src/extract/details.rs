//! Manga detail-page extraction and the chapter-numbering algorithm.
//!
//! Chapter display titles carry three shapes of numbering: "Chapter N"
//! (N possibly fractional), "Side Story K", or nothing usable. Side
//! stories have no canonical number on the page, so this module
//! synthesizes consecutive integers that sort strictly after every main
//! chapter while preserving the page's relative order among side
//! stories. Unnumbered chapters get `-1.0` and sort first.

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;

use super::{Chapter, MangaDetails};
use crate::error::ScrapeError;

static MANGA_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.post-title h1").unwrap());

static CHAPTER_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.wp-manga-chapter").unwrap());

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

/// Matches "Chapter N" where N is an integer or decimal number.
static CHAPTER_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Chapter\s*(\d+(?:\.\d+)?)").unwrap());

/// Matches "Side Story K" with an integer K.
static SIDE_STORY_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Side Story\s*(\d+)").unwrap());

/// How a raw chapter entry classified against the title patterns.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RawKind {
    /// Numeric main chapter.
    Main(f64),
    /// Side story with its provisional ordering key from the page.
    Side(i64),
    /// Neither pattern matched.
    Unnumbered,
}

fn classify(title: &str) -> RawKind {
    if let Some(caps) = CHAPTER_NUMBER.captures(title) {
        if let Ok(number) = caps[1].parse::<f64>() {
            return RawKind::Main(number);
        }
    }

    if let Some(caps) = SIDE_STORY_NUMBER.captures(title) {
        if let Ok(key) = caps[1].parse::<i64>() {
            return RawKind::Side(key);
        }
    }

    RawKind::Unnumbered
}

/// Collects the text of an element, skipping any `<span>` subtree.
///
/// The title heading embeds badge spans ("NEW", "HOT") that must not
/// appear in the returned title.
fn collect_text_skipping_spans(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) if e.name() != "span" => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text_skipping_spans(child_ref, out);
                }
            }
            _ => {}
        }
    }
}

fn title_without_badges(element: ElementRef) -> String {
    let mut raw = String::new();
    collect_text_skipping_spans(element, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Assigns final numbers and produces the globally ascending chapter list.
///
/// Side stories are renumbered to the first integers strictly greater
/// than the highest main-chapter number, in page order. All sorts are
/// stable, so ties keep document order.
fn number_chapters(raw: Vec<(String, String)>) -> Vec<Chapter> {
    let mut main_chapters = Vec::new();
    let mut side_stories: Vec<(i64, Chapter)> = Vec::new();

    for (title, url) in raw {
        match classify(&title) {
            RawKind::Main(number) => main_chapters.push(Chapter {
                title,
                url,
                number,
                is_side_story: false,
            }),
            RawKind::Side(key) => side_stories.push((
                key,
                Chapter {
                    title,
                    url,
                    number: -1.0,
                    is_side_story: true,
                },
            )),
            RawKind::Unnumbered => main_chapters.push(Chapter {
                title,
                url,
                number: -1.0,
                is_side_story: false,
            }),
        }
    }

    main_chapters.sort_by(|a, b| a.number.total_cmp(&b.number));
    side_stories.sort_by_key(|(key, _)| *key);

    let max_main = main_chapters.last().map(|c| c.number).unwrap_or(0.0);

    // First integer strictly greater than max_main. ceil() alone is not
    // enough when max_main is already whole (ceil(5.0) == 5.0).
    let mut start = max_main.ceil();
    if start <= max_main {
        start += 1.0;
    }

    let mut chapters = main_chapters;
    for (i, (_, mut chapter)) in side_stories.into_iter().enumerate() {
        chapter.number = start + i as f64;
        chapters.push(chapter);
    }

    // Merge the two runs into one globally ascending sequence.
    chapters.sort_by(|a, b| a.number.total_cmp(&b.number));
    chapters
}

/// Extracts the title and numbered chapter list from a detail page.
///
/// Fails when the title heading or the chapter list is absent from the
/// page structure.
pub fn parse_manga_details(html: &str) -> Result<MangaDetails, ScrapeError> {
    let doc = Html::parse_document(html);

    let title_element = doc
        .select(&MANGA_TITLE)
        .next()
        .ok_or_else(|| ScrapeError::ElementNotFound("manga title heading".to_string()))?;
    let title = title_without_badges(title_element);

    let raw: Vec<(String, String)> = doc
        .select(&CHAPTER_ITEM)
        .filter_map(|item| {
            let link = item.select(&ANCHOR).next()?;
            let href = link.value().attr("href")?;
            let display = link.text().collect::<String>().trim().to_string();
            Some((display, href.to_string()))
        })
        .collect();

    if raw.is_empty() {
        return Err(ScrapeError::ElementNotFound("chapter list".to_string()));
    }

    Ok(MangaDetails {
        title,
        chapters: number_chapters(raw),
    })
}
