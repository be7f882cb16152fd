// ABOUTME: FallbackSynthesizer builds a total metadata triple from a URL string alone.
// ABOUTME: Uses the hostname when the URL parses, otherwise the raw string; never fails.

use url::Url;

use crate::result::MetadataResult;

/// Description used when no hostname can be derived.
pub const NO_DESCRIPTION: &str = "No description available";
/// Title used when the input is blank.
pub const UNTITLED: &str = "Untitled link";

/// Derive fallback metadata from the structure of `url`.
///
/// `https://example.com/page` becomes `{ "example.com", "Content from example.com", null }`.
/// Input that does not parse (or has no host) keeps the raw string as title.
pub fn synthesize(url: &str) -> MetadataResult {
    match hostname(url) {
        Some(host) => MetadataResult {
            description: format!("Content from {}", host),
            title: host,
            image: None,
        },
        None => {
            let raw = url.trim();
            MetadataResult {
                title: if raw.is_empty() {
                    UNTITLED.to_string()
                } else {
                    raw.to_string()
                },
                description: NO_DESCRIPTION.to_string(),
                image: None,
            }
        }
    }
}

fn hostname(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
}
