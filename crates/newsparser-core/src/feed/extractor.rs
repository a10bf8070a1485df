//! Long-form body extraction from article pages.

use scraper::{ElementRef, Html, Selector};

const SKIP_PARENTS: &[&str] = &["figcaption", "footer", "aside", "nav"];
const SKIP_CLASSES: &[&str] = &["media-caption", "footer", "timestamp", "byline"];
const MIN_BODY_PARAGRAPH: usize = 20;
const MIN_FALLBACK_PARAGRAPH: usize = 50;

fn paragraph_text(p: &ElementRef) -> String {
    let raw = p.text().collect::<String>();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_boilerplate(p: &ElementRef) -> bool {
    let in_skipped_parent = p
        .parent()
        .and_then(ElementRef::wrap)
        .map(|parent| SKIP_PARENTS.contains(&parent.value().name()))
        .unwrap_or(false);

    in_skipped_parent || p.value().classes().any(|class| SKIP_CLASSES.contains(&class))
}

/// Pull the readable body out of an article page.
///
/// Paragraphs inside the first `<article>` (or `<main>`) are preferred. When
/// that yields nothing, every sufficiently long paragraph on the page is used.
/// Returns `None` when no paragraph survives.
pub fn extract_article_body(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let paragraphs = Selector::parse("p").ok()?;

    let container = ["article", "main"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| document.select(&selector).next());

    let mut blocks: Vec<String> = container
        .map(|body| {
            body.select(&paragraphs)
                .filter(|p| !is_boilerplate(p))
                .map(|p| paragraph_text(&p))
                .filter(|text| text.chars().count() > MIN_BODY_PARAGRAPH)
                .collect()
        })
        .unwrap_or_default();

    if blocks.is_empty() {
        blocks = document
            .select(&paragraphs)
            .map(|p| paragraph_text(&p))
            .filter(|text| text.chars().count() > MIN_FALLBACK_PARAGRAPH)
            .collect();
    }

    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n\n"))
    }
}
