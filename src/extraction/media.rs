//! Image and caption pairs from article figures.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::cleaning::normalizer::{NormalizeMode, Normalizer};
use crate::config::{CdnTemplate, MediaRules};
use crate::error::Result;
use crate::extraction::{compile_selector, element_text};
use crate::models::MediaItem;

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("img selector"));

/// Rewrites image URLs that carry a recognizable media id.
#[derive(Debug, Clone)]
pub struct CdnRewriter {
    id_pattern: Regex,
    template: String,
}

impl CdnRewriter {
    /// Fill the size and quality placeholders of the template up front; only
    /// `{id}` is substituted per image.
    pub fn new(cdn: &CdnTemplate) -> Result<Self> {
        let template = cdn
            .template
            .replace("{width}", &cdn.width.to_string())
            .replace("{height}", &cdn.height.to_string())
            .replace("{quality}", &cdn.quality.to_string());
        Ok(Self {
            id_pattern: Regex::new(&cdn.id_pattern)?,
            template,
        })
    }

    /// The canonical URL, or `url` unchanged when no media id is found.
    pub fn rewrite(&self, url: &str) -> String {
        match self.id_pattern.captures(url).and_then(|caps| caps.get(1)) {
            Some(id) => self.template.replace("{id}", id.as_str()),
            None => url.to_string(),
        }
    }
}

/// Finds figure images and their captions.
///
/// Built once per run; holds the compiled figure and caption selectors, the
/// caption length threshold and the optional CDN rewriter.
#[derive(Debug, Clone)]
pub struct MediaExtractor {
    figure: Selector,
    caption: Selector,
    min_caption_chars: usize,
    rewriter: Option<CdnRewriter>,
    normalizer: Normalizer,
}

impl MediaExtractor {
    /// Compile the configured media rules.
    ///
    /// # Arguments
    ///
    /// * `rules` - Figure and caption selectors, caption threshold, CDN template
    /// * `normalizer` - Applied in gentle mode to captions
    ///
    /// # Errors
    ///
    /// Returns an error when a selector or the CDN id pattern does not compile.
    pub fn new(rules: &MediaRules, normalizer: Normalizer) -> Result<Self> {
        Ok(Self {
            figure: compile_selector(&rules.figure_selector)?,
            caption: compile_selector(&rules.caption_selector)?,
            min_caption_chars: rules.min_caption_chars,
            rewriter: rules.cdn.as_ref().map(CdnRewriter::new).transpose()?,
            normalizer,
        })
    }

    /// Collect figure images in page order. Relative sources resolve
    /// against `base`; identical (url, caption) pairs are kept once.
    pub fn extract_media(&self, document: &Html, base: Option<&Url>) -> Vec<MediaItem> {
        let media: Vec<MediaItem> = document
            .select(&self.figure)
            .filter_map(|figure| {
                let url = self.image_url(figure, base)?;
                let caption = self.caption(figure);
                Some(MediaItem::image(url, caption))
            })
            .unique_by(|item| (item.url.clone(), item.caption.clone()))
            .collect();
        debug!(count = media.len(), "Extracted media");
        media
    }

    fn image_url(&self, figure: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
        let img = figure.select(&IMG).next()?;
        let src = ["src", "data-src"]
            .iter()
            .filter_map(|attr| img.value().attr(attr))
            .map(str::trim)
            .find(|src| !src.is_empty() && !src.starts_with("data:"))?;

        let resolved = match resolve_src(src, base) {
            Ok(url) => url,
            Err(e) => {
                debug!(src, error = %e, "Skipping image with unresolvable source");
                return None;
            }
        };
        Some(match &self.rewriter {
            Some(rewriter) => rewriter.rewrite(&resolved),
            None => resolved,
        })
    }

    /// Normalized caption, or empty when missing or too short to be useful.
    fn caption(&self, figure: ElementRef<'_>) -> String {
        let Some(element) = figure.select(&self.caption).next() else {
            return String::new();
        };
        let caption = self
            .normalizer
            .normalize(&element_text(element), NormalizeMode::Gentle);
        if caption.chars().count() < self.min_caption_chars {
            String::new()
        } else {
            caption
        }
    }
}

/// Resolve an image source against the page URL.
///
/// Without a page URL the source is kept as written, normalized when it is
/// already absolute.
///
/// # Errors
///
/// Returns [`crate::error::FeedError::Url`] when `src` cannot be joined onto `base`.
fn resolve_src(src: &str, base: Option<&Url>) -> Result<String> {
    match base {
        Some(base) => Ok(base.join(src)?.to_string()),
        None => Ok(Url::parse(src).map(|u| u.to_string()).unwrap_or_else(|_| src.to_string())),
    }
}
