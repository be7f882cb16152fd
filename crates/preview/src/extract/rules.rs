// ABOUTME: The ordered extraction rule table for title, description and image.
// ABOUTME: Each rule is a typed probe evaluated against a parsed document; earlier rules win per field.

use scraper::Html;
use url::Url;

use super::fields::{attr_first, element_text, meta_content};
use super::image::{first_qualifying_image, resolve_image_url};

use self::Category::{Generic, OpenGraph, TwitterCard};
use self::Field::{Description, Image, Title};

/// The field a rule produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Description,
    Image,
}

/// Rule families, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    OpenGraph,
    TwitterCard,
    Generic,
}

/// How a rule reads its value from the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// `content` attribute of the first matching meta tag.
    Meta(&'static str),
    /// Normalized text of the first matching element.
    Text(&'static str),
    /// Named attribute of the first matching element.
    Attr(&'static str, &'static str),
    /// First `<img>` that qualifies as a preview image.
    FirstImage,
}

/// One extraction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub field: Field,
    pub category: Category,
    pub probe: Probe,
}

impl Rule {
    pub const fn new(field: Field, category: Category, probe: Probe) -> Self {
        Self {
            field,
            category,
            probe,
        }
    }

    /// Evaluate the rule. Image values are resolved against `base` and must be absolute http(s).
    pub fn evaluate(&self, doc: &Html, base: &Url) -> Option<String> {
        let raw = match self.probe {
            Probe::Meta(selector) => meta_content(doc, selector),
            Probe::Text(selector) => element_text(doc, selector),
            Probe::Attr(selector, attr) => attr_first(doc, selector, attr),
            Probe::FirstImage => first_qualifying_image(doc, base),
        }?;

        match self.field {
            Field::Image => resolve_image_url(&raw, base),
            Field::Title | Field::Description => Some(raw),
        }
    }
}

/// Built-in rules. Order within the table is the priority order per field.
#[rustfmt::skip]
pub const DEFAULT_RULES: &[Rule] = &[
    Rule::new(Title, OpenGraph, Probe::Meta("meta[property='og:title'], meta[name='og:title']")),
    Rule::new(Title, TwitterCard, Probe::Meta("meta[name='twitter:title'], meta[property='twitter:title']")),
    Rule::new(Title, Generic, Probe::Text("title")),
    Rule::new(Title, Generic, Probe::Text("h1")),
    Rule::new(Description, OpenGraph, Probe::Meta("meta[property='og:description'], meta[name='og:description']")),
    Rule::new(Description, TwitterCard, Probe::Meta("meta[name='twitter:description'], meta[property='twitter:description']")),
    Rule::new(Description, Generic, Probe::Meta("meta[name='description']")),
    Rule::new(Description, Generic, Probe::Meta("meta[itemprop='description']")),
    Rule::new(Image, OpenGraph, Probe::Meta("meta[property='og:image'], meta[name='og:image']")),
    Rule::new(Image, OpenGraph, Probe::Meta("meta[property='og:image:secure_url']")),
    Rule::new(Image, OpenGraph, Probe::Meta("meta[property='og:image:url']")),
    Rule::new(Image, TwitterCard, Probe::Meta("meta[name='twitter:image'], meta[property='twitter:image']")),
    Rule::new(Image, TwitterCard, Probe::Meta("meta[name='twitter:image:src']")),
    Rule::new(Image, Generic, Probe::Attr("link[rel='image_src']", "href")),
    Rule::new(Image, Generic, Probe::FirstImage),
];
