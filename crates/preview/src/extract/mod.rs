// ABOUTME: MetadataExtractor derives a partial title/description/image triple from fetched HTML.
// ABOUTME: Fields resolve independently through the ordered rule table; missing fields stay None.

pub mod fields;
pub mod image;
pub mod rules;

use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

pub use self::rules::{Category, Field, Probe, Rule, DEFAULT_RULES};

/// Fields found in a document. `None` means no rule produced a non-empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl PartialMetadata {
    /// Returns true if no field was extracted.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.image.is_none()
    }

    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Description => &mut self.description,
            Field::Image => &mut self.image,
        }
    }
}

/// Applies an ordered rule list to HTML documents.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    rules: Vec<Rule>,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::with_rules(DEFAULT_RULES.to_vec())
    }
}

impl MetadataExtractor {
    /// Use a custom rule list. Order is priority.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Extract the triple from `html`, resolving image URLs against `final_url`.
    ///
    /// Malformed markup is parsed leniently and simply yields fewer fields.
    pub fn extract(&self, html: &str, final_url: &Url) -> PartialMetadata {
        let doc = Html::parse_document(html);
        let mut found = PartialMetadata::default();

        for rule in &self.rules {
            let slot = found.slot(rule.field);
            if slot.is_some() {
                continue;
            }
            *slot = rule.evaluate(&doc, final_url);
        }

        found
    }
}

/// Extract with the built-in rules.
pub fn extract(html: &str, final_url: &Url) -> PartialMetadata {
    MetadataExtractor::default().extract(html, final_url)
}
