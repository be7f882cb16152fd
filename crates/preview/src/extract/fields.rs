// ABOUTME: Low-level HTML field readers shared by the extraction rules.
// ABOUTME: Provides helpers to read meta content, element text and attributes with whitespace normalization.

//! Low-level field readers.
//!
//! Key behaviors:
//! - The first matching element with a non-empty value wins.
//! - Whitespace is normalized (collapsed to single spaces, trimmed).
//! - Empty strings are treated as no match.
//! - An unparsable selector yields no match instead of an error.

use scraper::{Html, Selector};

/// Normalizes whitespace in a string by collapsing runs of whitespace into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts the `content` attribute from the first matching meta tag with a non-empty value.
pub fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    attr_first(doc, selector, "content")
}

/// Extracts an attribute value from the first matching element where it is non-empty.
pub fn attr_first(doc: &Html, selector: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(normalize_whitespace)
        .find(|value| !value.is_empty())
}

/// Extracts the normalized inner text of the first matching element with any text.
pub fn element_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .map(|el| normalize_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        .find(|text| !text.is_empty())
}
