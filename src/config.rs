//! Runtime configuration loaded from an optional YAML file.
//!
//! All of the site-specific knowledge lives here as data rather than code:
//! the table of mis-encoded punctuation, the teaser sentinel, the boilerplate
//! patterns, the CSS selectors that locate the article body and its figures,
//! and the CDN template used to canonicalize image URLs. The source site
//! changes its templates often, so these are expected to be edited without
//! touching the extraction logic.
//!
//! Every section uses `#[serde(default)]`, so a config file only needs to
//! name the values it wants to change:
//!
//! ```yaml
//! max_chars: 1100
//! boilerplate:
//!   - "(?i)subscribe"
//! channel:
//!   title: "The Ark (Full Text)"
//! ```

use crate::error::Result;
use crate::extraction::bound::DEFAULT_OVERFLOW_MARGIN;
use crate::models::ChannelMeta;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

/// Upstream feed used when neither the CLI nor the environment names one.
pub const DEFAULT_FEED_URL: &str = "https://www.thearknewspaper.com/blog-feed.xml";

/// Promo text the site places in descriptions of issue teasers.
pub const DEFAULT_TEASER_SENTINEL: &str =
    "HE ARK HAS THE STORY IN THIS WEEK'S ARK • Click the link in our bio for digital-edition access";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream feed URL; the CLI flag wins over this value.
    pub feed_url: String,
    /// Character budget for each item's assembled HTML body.
    pub max_chars: usize,
    /// How far past `max_chars` a paragraph break may sit and still be used.
    pub overflow_margin: usize,
    /// Literal replacements for punctuation that went through a broken encoding pass.
    pub garbled: Vec<GarbledRule>,
    /// Normalization leaves any text containing this string untouched.
    pub teaser_sentinel: Option<String>,
    /// Case-insensitive regexes matching non-article text.
    pub boilerplate: Vec<String>,
    pub extraction: ExtractionRules,
    pub media: MediaRules,
    pub channel: ChannelOverrides,
    pub fetch: FetchSettings,
}

/// One entry of the garbled-text table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarbledRule {
    pub from: String,
    pub to: String,
}

impl GarbledRule {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Selectors and thresholds for the article body strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionRules {
    /// Container marking the article body in the current page template.
    pub content_wrapper: String,
    /// Text-bearing elements inside the content wrapper.
    pub leaf_selector: String,
    /// Font family that historically marked body paragraphs in inline styles.
    pub style_font_family: String,
    /// Any of these font sizes, together with the family, marks a body paragraph.
    pub style_font_sizes: Vec<String>,
    /// Regex matched against container class names in the generic fallback.
    pub generic_class_pattern: String,
    /// Paragraphs picked by the generic fallback must be at least this long.
    pub generic_min_chars: usize,
    /// Shorter paragraphs are dropped by every strategy.
    pub min_paragraph_chars: usize,
    /// Generic fallback output with fewer paragraphs counts as no content.
    pub min_paragraphs: usize,
}

/// Selectors, threshold and URL rewriting for figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaRules {
    pub figure_selector: String,
    pub caption_selector: String,
    /// Captions shorter than this (after normalization) are dropped.
    pub min_caption_chars: usize,
    /// Rewrite recognizable image URLs to the CDN template; `None` disables it.
    pub cdn: Option<CdnTemplate>,
}

/// Canonical CDN form for image URLs.
///
/// `template` may use `{id}`, `{width}`, `{height}` and `{quality}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CdnTemplate {
    /// Regex whose first capture group is the media identifier.
    pub id_pattern: String,
    pub template: String,
    pub width: u32,
    pub height: u32,
    pub quality: u32,
}

/// Channel metadata set from the config file. Unset fields keep the
/// seeded or built-in values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelOverrides {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub self_link: Option<String>,
}

/// HTTP client and retry settings shared by the feed and article fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub user_agent: String,
    /// Retries after the first attempt. Client errors (4xx) are never retried.
    pub max_retries: usize,
    /// Backoff before the first retry, doubled on each further retry.
    pub base_delay_ms: u64,
    /// Whole-request timeout.
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            max_chars: 2500,
            overflow_margin: DEFAULT_OVERFLOW_MARGIN,
            garbled: default_garbled_table(),
            teaser_sentinel: Some(DEFAULT_TEASER_SENTINEL.to_string()),
            boilerplate: default_boilerplate_patterns(),
            extraction: ExtractionRules::default(),
            media: MediaRules::default(),
            channel: ChannelOverrides::default(),
            fetch: FetchSettings::default(),
        }
    }
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            content_wrapper: r#"[data-hook="post-description"]"#.to_string(),
            leaf_selector: "p, h2, h3, blockquote".to_string(),
            style_font_family: "Georgia".to_string(),
            style_font_sizes: vec!["18px".to_string(), "1.5em".to_string()],
            generic_class_pattern: "(?i)article|content|post".to_string(),
            generic_min_chars: 100,
            min_paragraph_chars: 20,
            min_paragraphs: 2,
        }
    }
}

impl Default for MediaRules {
    fn default() -> Self {
        Self {
            figure_selector: "figure".to_string(),
            caption_selector: r#"figcaption, [data-hook="imageCaption"]"#.to_string(),
            min_caption_chars: 20,
            cdn: Some(CdnTemplate::default()),
        }
    }
}

impl Default for CdnTemplate {
    fn default() -> Self {
        Self {
            id_pattern: r"/media/([A-Za-z0-9_~.\-]+)".to_string(),
            template:
                "https://static.wixstatic.com/media/{id}/v1/fill/w_{width},h_{height},al_c,q_{quality}/{id}"
                    .to_string(),
            width: 1200,
            height: 800,
            quality: 85,
        }
    }
}

impl ChannelOverrides {
    /// Replace every field of `meta` that this section sets.
    pub fn apply(&self, mut meta: ChannelMeta) -> ChannelMeta {
        let fields = [
            (&self.title, &mut meta.title),
            (&self.link, &mut meta.link),
            (&self.description, &mut meta.description),
            (&self.language, &mut meta.language),
            (&self.self_link, &mut meta.self_link),
        ];
        for (value, slot) in fields {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }
        meta
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: concat!("ark_full_feed/", env!("CARGO_PKG_VERSION")).to_string(),
            max_retries: 2,
            base_delay_ms: 500,
            timeout_secs: 30,
        }
    }
}

/// Mis-encoded punctuation seen in the upstream feed and article pages.
///
/// The first group is UTF-8 read back as Mac Roman, the second as
/// Windows-1252. Several entries are prefixes of others ("â€" of "â€™");
/// the normalizer sorts by length so the longer sequence always wins.
pub fn default_garbled_table() -> Vec<GarbledRule> {
    vec![
        GarbledRule::new("‚Äôs", "'s"),
        GarbledRule::new("‚Äôt", "'t"),
        GarbledRule::new("‚Äô", "'"),
        GarbledRule::new("‚Äò", "'"),
        GarbledRule::new("‚Äú", "\""),
        GarbledRule::new("‚Äù", "\""),
        GarbledRule::new("‚Äî", "-"),
        GarbledRule::new("‚Äì", "-"),
        GarbledRule::new("‚Ä¶", "..."),
        GarbledRule::new("¬†", " "),
        GarbledRule::new("â€™", "'"),
        GarbledRule::new("â€˜", "'"),
        GarbledRule::new("â€œ", "\""),
        GarbledRule::new("â€\u{9d}", "\""),
        GarbledRule::new("â€”", "-"),
        GarbledRule::new("â€“", "-"),
        GarbledRule::new("â€¦", "..."),
        GarbledRule::new("Â\u{a0}", " "),
        GarbledRule::new("â€", "\""),
    ]
}

/// Site furniture that shows up inside article containers.
pub fn default_boilerplate_patterns() -> Vec<String> {
    [
        r"subscribe (now|today|to the ark)",
        r"click the link in our bio",
        r"digital[- ]edition access",
        r"support (local|independent) journalism",
        r"comment on this article",
        r"^\s*(©|\(c\))",
        r"copyright \d{4}",
        r"all rights reserved",
        r"^\s*(legal|public) notices?\s*$",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl Config {
    /// Load configuration from a YAML file, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file given; using built-in defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(Path::new(path))?;
        let config = Self::from_yaml(&raw)?;
        info!(
            path,
            boilerplate_patterns = config.boilerplate.len(),
            garbled_rules = config.garbled.len(),
            max_chars = config.max_chars,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse a YAML document; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::FeedError::Config`] for malformed YAML or
    /// values of the wrong type.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }
}
