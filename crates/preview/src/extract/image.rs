// ABOUTME: Image URL resolution and qualification for preview images.
// ABOUTME: Resolves candidates against the served page URL and filters tracking pixels and spacers.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Patterns indicating tracking pixels or placeholder images (case-insensitive check).
const INVALID_PATTERNS: &[&str] = &[
    "pixel",
    "tracking",
    "analytics",
    "beacon",
    "spacer",
    "clear.gif",
    "blank.gif",
    "1x1",
];

/// Resolves a possibly relative image reference against `base`.
///
/// Returns `None` for empty input, unparsable references and anything that
/// does not end up as an absolute http(s) URL.
pub fn resolve_image_url(src: &str, base: &Url) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    let resolved = base.join(src).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Checks if an image URL is worth showing (not a tracking pixel or similar).
pub fn is_valid_image_url(url: &str) -> bool {
    let url_lower = url.to_lowercase();

    if INVALID_PATTERNS
        .iter()
        .any(|pattern| url_lower.contains(pattern))
    {
        return false;
    }

    !contains_tiny_dimensions(&url_lower)
}

/// Checks if URL contains indicators of 1x1 pixel images.
fn contains_tiny_dimensions(url: &str) -> bool {
    if url.contains("width=1&") || url.ends_with("width=1") {
        return true;
    }
    if url.contains("height=1&") || url.ends_with("height=1") {
        return true;
    }
    if url.contains("w=1&") || url.contains("&w=1") || url.ends_with("?w=1") {
        return true;
    }
    url.contains("h=1&") || url.contains("&h=1") || url.ends_with("?h=1")
}

/// Whether the element declares itself as a 1px image.
fn declared_tiny(el: &ElementRef) -> bool {
    ["width", "height"]
        .iter()
        .filter_map(|attr| el.value().attr(attr))
        .any(|value| matches!(value.trim().trim_end_matches("px"), "0" | "1"))
}

/// Returns the first `<img>` whose source resolves to a qualifying absolute URL.
pub fn first_qualifying_image(doc: &Html, base: &Url) -> Option<String> {
    let selector = Selector::parse("img[src]").ok()?;
    doc.select(&selector)
        .filter(|el| !declared_tiny(el))
        .filter_map(|el| el.value().attr("src"))
        .filter_map(|src| resolve_image_url(src, base))
        .find(|url| is_valid_image_url(url))
}
