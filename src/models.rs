//! Data models flowing through the enrichment pipeline.
//!
//! - [`SourceItem`]: one entry read from the upstream feed
//! - [`Fragment`]: one paragraph of extracted article text
//! - [`ExtractedContent`]: the article body found for an item
//! - [`MediaItem`]: an image and its caption
//! - [`OutputItem`] / [`OutputFeed`]: the enriched document, ready to serialize

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cleaning::dedup::signature;

/// An article stub as published in the upstream feed.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceItem {
    /// Article URL; identifies the item for the whole run.
    pub link: String,
    pub title: String,
    /// Summary text, possibly containing HTML.
    pub description: String,
    /// Identifier supplied by the source, when it supplied a real one.
    pub guid: Option<String>,
    /// `None` when absent or unparseable; the assembler substitutes the run time.
    pub published_at: Option<DateTime<Utc>>,
    pub creator: Option<String>,
    pub categories: Vec<String>,
}

/// One paragraph of cleaned article text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    /// Normalized form used only for duplicate detection.
    pub signature: String,
}

impl Fragment {
    /// Wrap cleaned text and compute its signature.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let signature = signature(&text);
        Self { text, signature }
    }
}

/// Which extraction strategy produced the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Content-wrapper container with nested text elements.
    Structural,
    /// Paragraphs carrying the historical body-text inline style.
    StyleFallback,
    /// Long paragraphs inside article-ish containers.
    GenericFallback,
    None,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Structural => "structural",
            Self::StyleFallback => "style_fallback",
            Self::GenericFallback => "generic_fallback",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// The article body found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    /// Deduplicated paragraphs in page order.
    pub fragments: Vec<Fragment>,
    pub method: ExtractionMethod,
    /// Paragraphs rendered as HTML and bounded to the character budget.
    pub html: String,
}

impl ExtractedContent {
    /// No paragraphs, method [`ExtractionMethod::None`].
    pub fn empty() -> Self {
        Self {
            fragments: Vec::new(),
            method: ExtractionMethod::None,
            html: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

impl Default for ExtractedContent {
    fn default() -> Self {
        Self::empty()
    }
}

/// An image found in an article, with its caption.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    /// Empty when the page had no caption or it was too short to keep.
    pub caption: String,
    pub medium: String,
}

impl MediaItem {
    /// An `image` medium item.
    pub fn image(url: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            caption: caption.into(),
            medium: "image".to_string(),
        }
    }
}

/// Channel-level metadata of the output document.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMeta {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    pub generator: String,
    /// Public URL of the output document itself.
    pub self_link: String,
}

impl Default for ChannelMeta {
    fn default() -> Self {
        Self {
            title: "The Ark Newspaper (Full Text)".to_string(),
            link: "https://www.thearknewspaper.com/news".to_string(),
            description: "Full-content RSS feed generated from The Ark Newspaper blog.".to_string(),
            language: "en-us".to_string(),
            generator: concat!("ark_full_feed ", env!("CARGO_PKG_VERSION")).to_string(),
            self_link: "https://www.thearknewspaper.com/full_feed.xml".to_string(),
        }
    }
}

/// One enriched entry of the output document.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub guid: String,
    /// Whether `guid` is the article URL.
    pub guid_is_permalink: bool,
    pub published_at: DateTime<Utc>,
    pub creator: Option<String>,
    pub categories: Vec<String>,
    /// Bounded article HTML; empty when nothing was extracted.
    pub content_html: String,
    pub media: Vec<MediaItem>,
}

/// The whole enriched document for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFeed {
    pub channel: ChannelMeta,
    pub last_build: DateTime<Utc>,
    pub items: Vec<OutputItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_signature_ignores_case_and_spacing() {
        let a = Fragment::new("The council  met on Tuesday.");
        let b = Fragment::new("the council met on tuesday.");
        assert_eq!(a.signature, b.signature);
        assert_ne!(a.text, b.text);
    }

    #[test]
    fn test_empty_content() {
        let content = ExtractedContent::empty();
        assert!(content.is_empty());
        assert_eq!(content.method, ExtractionMethod::None);
        assert_eq!(content.html, "");
    }

    #[test]
    fn test_media_item_image() {
        let item = MediaItem::image("https://cdn.example/a.jpg", "");
        assert_eq!(item.medium, "image");
    }

    #[test]
    fn test_media_item_serialization() {
        let item = MediaItem::image("https://cdn.example/a.jpg", "The ferry leaving Tiburon at dusk");
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"medium\":\"image\""));
        let back: MediaItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_method_display() {
        assert_eq!(ExtractionMethod::StyleFallback.to_string(), "style_fallback");
        assert_eq!(ExtractionMethod::None.to_string(), "none");
    }
}
