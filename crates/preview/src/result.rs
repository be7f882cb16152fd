// ABOUTME: MetadataResult, the total title/description/image triple, and lookup Diagnostics.
// ABOUTME: Includes the field-by-field merge of extracted values over fallback values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::PartialMetadata;

/// Preview metadata for a link. `title` is never empty; `image` serializes as `null` when absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct MetadataResult {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
}

impl MetadataResult {
    /// Returns true if the result has a preview image.
    pub fn has_image(&self) -> bool {
        self.image.as_ref().map_or(false, |u| !u.is_empty())
    }

    /// Returns true if the result has a non-empty description.
    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl PartialMetadata {
    /// Fill every absent or blank field from `fallback`.
    pub fn merge_over(self, fallback: MetadataResult) -> MetadataResult {
        MetadataResult {
            title: non_empty(self.title).unwrap_or(fallback.title),
            description: non_empty(self.description).unwrap_or(fallback.description),
            image: non_empty(self.image).or(fallback.image),
        }
    }
}

/// Which branch of the lookup produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    /// The page was fetched and extracted fields were merged over fallback values.
    Extracted,
    /// Nothing was fetched; the result is fallback metadata only.
    FallbackOnly,
}

/// Observability record for one lookup. Never influences the result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostics {
    pub requested_url: String,
    pub normalized_url: Option<String>,
    pub final_url: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub attempts: u32,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub html_length: Option<usize>,
    pub path: ResolutionPath,
    pub failure: Option<String>,
    pub extracted: Option<PartialMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fallback() -> MetadataResult {
        MetadataResult {
            title: "example.com".to_string(),
            description: "Content from example.com".to_string(),
            image: None,
        }
    }

    #[test]
    fn merge_prefers_extracted_values() {
        let extracted = PartialMetadata {
            title: Some("Page".to_string()),
            description: Some("About the page".to_string()),
            image: Some("https://example.com/a.png".to_string()),
        };
        assert_eq!(
            extracted.merge_over(fallback()),
            MetadataResult {
                title: "Page".to_string(),
                description: "About the page".to_string(),
                image: Some("https://example.com/a.png".to_string()),
            }
        );
    }

    #[test]
    fn merge_fills_gaps_from_fallback() {
        let extracted = PartialMetadata {
            title: Some("Only Title".to_string()),
            ..Default::default()
        };
        assert_eq!(
            extracted.merge_over(fallback()),
            MetadataResult {
                title: "Only Title".to_string(),
                ..fallback()
            }
        );
    }

    #[test]
    fn merge_treats_blank_as_absent() {
        let extracted = PartialMetadata {
            title: Some("  ".to_string()),
            description: Some(String::new()),
            image: Some(String::new()),
        };
        assert_eq!(extracted.merge_over(fallback()), fallback());
    }

    #[test]
    fn image_serializes_as_null() {
        let json = serde_json::to_value(fallback()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "example.com",
                "description": "Content from example.com",
                "image": null
            })
        );
    }

    #[test]
    fn test_has_image() {
        let mut result = fallback();
        assert!(!result.has_image());

        result.image = Some(String::new());
        assert!(!result.has_image());

        result.image = Some("https://example.com/img.png".to_string());
        assert!(result.has_image());
    }

    #[test]
    fn test_has_description() {
        let mut result = fallback();
        assert!(result.has_description());
        result.description = " ".to_string();
        assert!(!result.has_description());
    }
}
