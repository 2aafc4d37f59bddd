//! Title fallback for short-form notes that carry no structured data.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::extract::{TITLE_WORD_LIMIT, truncate_words};

/// Sentences shorter than this are skipped.
const MIN_SENTENCE_WORDS: usize = 5;

/// Containers tried in order for the note body.
const CONTENT_SELECTORS: &[&str] = &[".markup", ".post-content", "article", "main", "body"];

/// Sentence terminators followed by whitespace or end of text.
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("sentence regex"));

/// Derive a title from rendered page text.
///
/// Returns the first sentence of at least 5 words (terminator dropped),
/// truncated to 20 words. If no sentence qualifies, the whole text truncated
/// the same way.
pub fn extract_note_title(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let doc = Html::parse_document(html);
    let text = CONTENT_SELECTORS
        .iter()
        .filter_map(|sel| Selector::parse(sel).ok())
        .find_map(|sel| {
            doc.select(&sel)
                .map(visible_text)
                .find(|text| !text.is_empty())
        })
        .unwrap_or_default();

    first_sentence(&text).unwrap_or_else(|| truncate_words(&text, TITLE_WORD_LIMIT))
}

fn first_sentence(text: &str) -> Option<String> {
    SENTENCE_END
        .split(text)
        .find(|segment| segment.split_whitespace().count() >= MIN_SENTENCE_WORDS)
        .map(|segment| truncate_words(segment, TITLE_WORD_LIMIT))
}

/// Whitespace-normalised text of an element, skipping script and style content.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
        });
        if !hidden {
            parts.push(text);
        }
    }

    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}
