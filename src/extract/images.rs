//! Chapter-page image-URL extraction.
//!
//! Image nodes carry the real URL in a lazy-load attribute (`data-src`),
//! not the standard `src`. A node without it is silently skipped; a page
//! without the reading container yields an empty list, not an error.

use scraper::{Html, Selector};
use std::sync::LazyLock;

static READING_CONTENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.reading-content").unwrap());

static CHAPTER_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img.wp-manga-chapter-img").unwrap());

/// Extracts image URLs from a chapter page in document order.
///
/// Document order is what fixes each image's 1-based sequence index.
pub fn parse_chapter_images(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);

    let Some(content) = doc.select(&READING_CONTENT).next() else {
        return Vec::new();
    };

    content
        .select(&CHAPTER_IMAGE)
        .filter_map(|img| img.value().attr("data-src"))
        .map(|src| src.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_in_document_order() {
        let html = r#"<div class="reading-content">
            <img class="wp-manga-chapter-img" data-src=" https://cdn.example.com/1.jpg ">
            <img class="wp-manga-chapter-img" data-src="https://cdn.example.com/2.jpg">
            <img class="wp-manga-chapter-img" data-src="https://cdn.example.com/3.jpg">
        </div>"#;

        let images = parse_chapter_images(html);
        assert_eq!(
            images,
            vec![
                "https://cdn.example.com/1.jpg",
                "https://cdn.example.com/2.jpg",
                "https://cdn.example.com/3.jpg",
            ]
        );
    }

    #[test]
    fn test_node_without_lazy_attribute_skipped() {
        let html = r#"<div class="reading-content">
            <img class="wp-manga-chapter-img" src="https://cdn.example.com/placeholder.gif">
            <img class="wp-manga-chapter-img" data-src="https://cdn.example.com/real.jpg">
        </div>"#;

        let images = parse_chapter_images(html);
        assert_eq!(images, vec!["https://cdn.example.com/real.jpg"]);
    }

    #[test]
    fn test_missing_container_yields_empty_list() {
        let html = r#"<div class="other"><img class="wp-manga-chapter-img" data-src="https://x/1.jpg"></div>"#;
        assert!(parse_chapter_images(html).is_empty());
    }

    #[test]
    fn test_images_outside_container_ignored() {
        let html = r#"
            <img class="wp-manga-chapter-img" data-src="https://x/banner.jpg">
            <div class="reading-content">
                <img class="wp-manga-chapter-img" data-src="https://x/page.jpg">
            </div>"#;
        assert_eq!(parse_chapter_images(html), vec!["https://x/page.jpg"]);
    }
}
