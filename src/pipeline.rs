//! Per-item enrichment: fetch each article, extract body and media, clean
//! the item's own metadata.
//!
//! Items are handled one at a time in feed order. A failed fetch never
//! stops the run; the item goes on with empty content and no media so its
//! original metadata still reaches the output.

use futures::stream::{self, StreamExt};
use scraper::Html;
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::cleaning::boilerplate::BoilerplateClassifier;
use crate::cleaning::normalizer::{NormalizeMode, Normalizer};
use crate::config::Config;
use crate::error::Result;
use crate::extraction::bound::LengthBounder;
use crate::extraction::content::ContentExtractor;
use crate::extraction::media::MediaExtractor;
use crate::fetch::FetchAsync;
use crate::models::{ExtractedContent, MediaItem, SourceItem};
use crate::utils::truncate_for_log;

/// Everything needed to turn a fetched page into content and media.
#[derive(Debug, Clone)]
pub struct Enricher {
    normalizer: Normalizer,
    content: ContentExtractor,
    media: MediaExtractor,
}

/// Result of enriching every item of the upstream feed.
#[derive(Debug, Default)]
pub struct EnrichedRun {
    /// Source items with cleaned title, description, creator and categories.
    pub items: Vec<SourceItem>,
    pub contents: HashMap<String, ExtractedContent>,
    /// Media-caption map keyed by article link.
    pub media_by_link: HashMap<String, Vec<MediaItem>>,
    pub failed_fetches: usize,
}

impl EnrichedRun {
    /// Items whose page yielded at least one paragraph.
    pub fn with_content(&self) -> usize {
        self.contents.values().filter(|c| !c.is_empty()).count()
    }

    /// Items with at least one image.
    pub fn with_media(&self) -> usize {
        self.media_by_link.values().filter(|m| !m.is_empty()).count()
    }
}

impl Enricher {
    /// Build the normalizer, classifier, bounder and both extractors from `config`.
    ///
    /// # Arguments
    ///
    /// * `config` - Effective configuration, after CLI overrides
    ///
    /// # Errors
    ///
    /// Returns an error when a configured pattern or selector does not compile.
    pub fn from_config(config: &Config) -> Result<Self> {
        let normalizer = Normalizer::new(&config.garbled, config.teaser_sentinel.clone())?;
        let boilerplate = BoilerplateClassifier::new(&config.boilerplate)?;
        let bounder = LengthBounder::new(config.max_chars, config.overflow_margin);
        debug!(
            boilerplate_patterns = boilerplate.patterns().len(),
            max_chars = bounder.max_chars,
            overflow_margin = bounder.overflow_margin,
            "Built enricher"
        );
        Ok(Self {
            content: ContentExtractor::new(&config.extraction, normalizer.clone(), boilerplate, bounder)?,
            media: MediaExtractor::new(&config.media, normalizer.clone())?,
            normalizer,
        })
    }

    /// Extract body and media from one fetched page.
    ///
    /// Parsing and extraction happen here in one synchronous call, so the
    /// parsed document never lives across an `.await`.
    ///
    /// # Arguments
    ///
    /// * `html` - Page body
    /// * `page_url` - Page address, used to resolve relative image sources
    pub fn process_page(&self, html: &str, page_url: &str) -> (ExtractedContent, Vec<MediaItem>) {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();
        let content = self.content.extract(&document);
        let media = self.media.extract_media(&document, base.as_ref());
        (content, media)
    }

    /// Copy of `item` with its text fields normalized. A teaser description
    /// is replaced by the article's first paragraph when there is one.
    pub fn clean_source_item(&self, item: &SourceItem, content: &ExtractedContent) -> SourceItem {
        let description = if self.normalizer.is_teaser(&item.description) {
            match content.fragments.first() {
                Some(first) => first.text.clone(),
                None => item.description.clone(),
            }
        } else {
            self.normalizer.normalize(&item.description, NormalizeMode::Gentle)
        };

        SourceItem {
            link: item.link.clone(),
            title: self.normalizer.normalize(&item.title, NormalizeMode::Gentle),
            description,
            guid: item.guid.clone(),
            published_at: item.published_at,
            creator: item
                .creator
                .as_deref()
                .map(|c| self.normalizer.normalize(c, NormalizeMode::Gentle)),
            categories: item
                .categories
                .iter()
                .map(|c| self.normalizer.normalize(c, NormalizeMode::Gentle))
                .collect(),
        }
    }
}

/// Fetch and enrich every item, sequentially and in feed order.
///
/// A failed fetch is logged and the item continues with empty content and
/// no media, so its original metadata still reaches the output.
///
/// # Arguments
///
/// * `fetcher` - Source of article HTML
/// * `enricher` - Extraction and cleanup rules for this run
/// * `items` - Upstream items in feed order
///
/// # Returns
///
/// The cleaned items plus content and media keyed by item link.
#[instrument(level = "info", skip_all, fields(items = items.len()))]
pub async fn enrich_items<F: FetchAsync>(fetcher: &F, enricher: &Enricher, items: &[SourceItem]) -> EnrichedRun {
    let processed: Vec<(SourceItem, ExtractedContent, Vec<MediaItem>, bool)> = stream::iter(items)
        .then(|item| async move {
            info!(title = %truncate_for_log(&item.title, 80), url = %item.link, "Processing item");
            let (content, media, failed) = match fetcher.fetch(&item.link).await {
                Ok(body) => {
                    let (content, media) = enricher.process_page(&body, &item.link);
                    (content, media, false)
                }
                Err(e) => {
                    error!(error = %e, url = %item.link, "Article fetch failed; emitting metadata only");
                    (ExtractedContent::empty(), Vec::new(), true)
                }
            };

            if content.is_empty() {
                warn!(url = %item.link, "No article body found");
            } else {
                info!(
                    url = %item.link,
                    method = %content.method,
                    paragraphs = content.fragments.len(),
                    media = media.len(),
                    "Extracted article"
                );
            }

            let cleaned = enricher.clean_source_item(item, &content);
            (cleaned, content, media, failed)
        })
        .collect()
        .await;

    let mut run = EnrichedRun::default();
    for (item, content, media, failed) in processed {
        if failed {
            run.failed_fetches += 1;
        }
        run.contents.insert(item.link.clone(), content);
        run.media_by_link.insert(item.link.clone(), media);
        run.items.push(item);
    }

    info!(
        total = run.items.len(),
        with_content = run.with_content(),
        with_media = run.with_media(),
        failed_fetches = run.failed_fetches,
        "Completed item enrichment"
    );
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TEASER_SENTINEL;
    use crate::error::FeedError;
    use crate::models::{ChannelMeta, ExtractionMethod};
    use crate::outputs::rss;
    use chrono::Utc;

    /// Serves pages from memory; unknown URLs answer 404.
    struct FakeFetcher {
        pages: HashMap<String, String>,
    }

    impl FakeFetcher {
        fn new(pages: &[(&str, String)]) -> Self {
            Self {
                pages: pages.iter().map(|(u, b)| (u.to_string(), b.clone())).collect(),
            }
        }
    }

    impl FetchAsync for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.pages.get(url).cloned().ok_or_else(|| FeedError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn enricher() -> Enricher {
        Enricher::from_config(&Config::default()).unwrap()
    }

    fn item(link: &str, title: &str, description: &str) -> SourceItem {
        SourceItem {
            link: link.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            guid: None,
            published_at: None,
            creator: None,
            categories: vec![],
        }
    }

    const P1: &str = "The Belvedere City Council approved the new seawall plan on Monday night.";
    const P2: &str = "Construction is expected to begin next spring and last roughly two years.";

    fn article_page() -> String {
        format!(
            r#"<html><body>
            <div data-hook="post-description">
              <p>{P1}</p><p>{P1}</p><p>{P2}</p>
              <figure><img src="https://cdn.example/media/XYZ123/orig.jpg">
                <figcaption>Ferry at Tiburon landing.</figcaption></figure>
            </div></body></html>"#
        )
    }

    #[tokio::test]
    async fn test_duplicate_paragraph_scenario() {
        let fetcher = FakeFetcher::new(&[("https://example.com/a1", article_page())]);
        let items = vec![item("https://example.com/a1", "Seawall", "Council votes")];
        let run = enrich_items(&fetcher, &enricher(), &items).await;

        let content = &run.contents["https://example.com/a1"];
        assert_eq!(content.method, ExtractionMethod::Structural);
        let texts: Vec<_> = content.fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec![P1, P2]);

        let media = &run.media_by_link["https://example.com/a1"];
        assert_eq!(media.len(), 1);
        assert!(media[0].url.contains("XYZ123"));
        assert_eq!(media[0].caption, "Ferry at Tiburon landing.");
    }

    #[tokio::test]
    async fn test_empty_page_still_emits_item() {
        let fetcher = FakeFetcher::new(&[(
            "https://example.com/a2",
            "<html><body><div>Nothing useful</div></body></html>".to_string(),
        )]);
        let items = vec![item("https://example.com/a2", "Quiet day", "Nothing happened")];
        let run = enrich_items(&fetcher, &enricher(), &items).await;
        assert!(run.contents["https://example.com/a2"].is_empty());
        assert!(run.media_by_link["https://example.com/a2"].is_empty());

        let feed = rss::assemble(&run.items, &run.contents, &run.media_by_link, ChannelMeta::default(), Utc::now());
        let xml = String::from_utf8(rss::serialize(&feed).unwrap()).unwrap();
        assert!(xml.contains("<title>Quiet day</title>"));
        assert!(xml.contains("<link>https://example.com/a2</link>"));
        assert!(xml.contains("<description>Nothing happened</description>"));
        assert!(!xml.contains("<content:encoded>"));
    }

    #[tokio::test]
    async fn test_fetch_failure_does_not_abort_run() {
        let fetcher = FakeFetcher::new(&[("https://example.com/ok", article_page())]);
        let items = vec![
            item("https://example.com/missing", "Gone", "Was here"),
            item("https://example.com/ok", "Present", "Still here"),
        ];
        let run = enrich_items(&fetcher, &enricher(), &items).await;
        assert_eq!(run.items.len(), 2);
        assert_eq!(run.items[0].link, "https://example.com/missing");
        assert_eq!(run.failed_fetches, 1);
        assert!(run.contents["https://example.com/missing"].is_empty());
        assert!(!run.contents["https://example.com/ok"].is_empty());
        assert_eq!(run.with_content(), 1);
        assert_eq!(run.with_media(), 1);
    }

    #[test]
    fn test_clean_source_item_normalizes_text() {
        let mut source = item("https://example.com/a1", "Mayor‚Äôs  plan", "It‚Äôs &ldquo;done&rdquo;");
        source.categories = vec!["Arts ‚Äì Culture".to_string()];
        let cleaned = enricher().clean_source_item(&source, &ExtractedContent::empty());
        assert_eq!(cleaned.title, "Mayor's plan");
        assert_eq!(cleaned.description, "It's \"done\"");
        assert_eq!(cleaned.categories, vec!["Arts - Culture"]);
        assert_eq!(source.title, "Mayor‚Äôs  plan");
    }

    #[test]
    fn test_teaser_description_replaced_by_first_paragraph() {
        let e = enricher();
        let source = item("https://example.com/a1", "Issue teaser", DEFAULT_TEASER_SENTINEL);
        let (content, _) = e.process_page(&article_page(), "https://example.com/a1");

        let cleaned = e.clean_source_item(&source, &content);
        assert_eq!(cleaned.description, P1);

        let cleaned = e.clean_source_item(&source, &ExtractedContent::empty());
        assert_eq!(cleaned.description, DEFAULT_TEASER_SENTINEL);
    }
}
