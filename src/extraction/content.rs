//! Location of the article body inside a page.
//!
//! The page template changes often, so extraction is an ordered list of
//! strategies. Each one maps a document to candidate paragraph texts; the
//! first strategy whose candidates survive cleaning wins:
//!
//! 1. **Structural**: text elements nested in the content-wrapper container.
//! 2. **Style fallback**: paragraphs whose inline style carries the body
//!    font family and one of the body font sizes.
//! 3. **Generic fallback**: long paragraphs inside containers whose class
//!    looks like `article`, `content` or `post`.
//!
//! Candidates are normalized, stripped of repeated sentences, and dropped
//! when they are boilerplate or too short. The survivors are deduplicated
//! by signature, rendered as `<p>` elements and bounded to the budget.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use quick_xml::escape::partial_escape;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::cleaning::boilerplate::BoilerplateClassifier;
use crate::cleaning::dedup::{dedupe_paragraphs, dedupe_sentences_within_paragraph};
use crate::cleaning::normalizer::{NormalizeMode, Normalizer, collapse_whitespace};
use crate::config::ExtractionRules;
use crate::error::Result;
use crate::extraction::bound::LengthBounder;
use crate::extraction::{compile_selector, element_text};
use crate::models::{ExtractedContent, ExtractionMethod, Fragment};

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("p selector"));
static CLASSED_CONTAINER: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div[class], article[class], section[class], main[class]")
        .expect("container selector")
});

/// Maps a document to raw candidate paragraph texts.
pub type StrategyFn = fn(&ContentExtractor, &Html) -> Vec<String>;

/// One entry of the fallback chain.
#[derive(Clone, Copy)]
pub struct Strategy {
    pub method: ExtractionMethod,
    pub run: StrategyFn,
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy").field("method", &self.method).finish()
    }
}

/// The fallback chain in priority order.
pub const STRATEGIES: [Strategy; 3] = [
    Strategy {
        method: ExtractionMethod::Structural,
        run: structural_candidates,
    },
    Strategy {
        method: ExtractionMethod::StyleFallback,
        run: style_candidates,
    },
    Strategy {
        method: ExtractionMethod::GenericFallback,
        run: generic_candidates,
    },
];

/// Extractor built once per run from the configured rules.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    content_wrapper: Selector,
    leaf: Selector,
    font_family: String,
    font_sizes: Vec<String>,
    generic_class: Regex,
    generic_min_chars: usize,
    min_paragraph_chars: usize,
    min_paragraphs: usize,
    normalizer: Normalizer,
    boilerplate: BoilerplateClassifier,
    bounder: LengthBounder,
}

impl ContentExtractor {
    /// Compile the configured selectors and patterns into an extractor.
    ///
    /// # Arguments
    ///
    /// * `rules` - Selectors, style markers and thresholds for the three strategies
    /// * `normalizer` - Applied in aggressive mode to every candidate
    /// * `boilerplate` - Drops site furniture after normalization
    /// * `bounder` - Limits the rendered HTML
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::FeedError::Selector`] or
    /// [`crate::error::FeedError::Pattern`] for rules that do not compile.
    pub fn new(
        rules: &ExtractionRules,
        normalizer: Normalizer,
        boilerplate: BoilerplateClassifier,
        bounder: LengthBounder,
    ) -> Result<Self> {
        Ok(Self {
            content_wrapper: compile_selector(&rules.content_wrapper)?,
            leaf: compile_selector(&rules.leaf_selector)?,
            font_family: rules.style_font_family.clone(),
            font_sizes: rules.style_font_sizes.clone(),
            generic_class: Regex::new(&rules.generic_class_pattern)?,
            generic_min_chars: rules.generic_min_chars,
            min_paragraph_chars: rules.min_paragraph_chars,
            min_paragraphs: rules.min_paragraphs,
            normalizer,
            boilerplate,
            bounder,
        })
    }

    /// Run the fallback chain. Never fails: a page with nothing usable
    /// yields [`ExtractedContent::empty`].
    pub fn extract(&self, document: &Html) -> ExtractedContent {
        for strategy in &STRATEGIES {
            let candidates = (strategy.run)(self, document);
            let found = candidates.len();
            let fragments = dedupe_paragraphs(self.qualify(candidates));
            if fragments.is_empty() {
                debug!(method = %strategy.method, candidates = found, "Strategy produced no paragraphs");
                continue;
            }

            if strategy.method == ExtractionMethod::GenericFallback
                && fragments.len() < self.min_paragraphs
            {
                debug!(
                    paragraphs = fragments.len(),
                    min = self.min_paragraphs,
                    "Generic fallback found too few paragraphs; treating as no content"
                );
                return ExtractedContent::empty();
            }

            let html = self.bounder.bound(&render_paragraphs(&fragments));
            debug!(
                method = %strategy.method,
                candidates = found,
                paragraphs = fragments.len(),
                html_chars = html.chars().count(),
                "Extracted article body"
            );
            return ExtractedContent {
                fragments,
                method: strategy.method,
                html,
            };
        }
        ExtractedContent::empty()
    }

    #[cfg(test)]
    pub fn extract_from_str(&self, html: &str) -> ExtractedContent {
        self.extract(&Html::parse_document(html))
    }

    /// Clean candidates and keep the ones that read like article text.
    fn qualify(&self, candidates: Vec<String>) -> Vec<Fragment> {
        candidates
            .into_iter()
            .filter_map(|raw| {
                let text = self.normalizer.normalize(&raw, NormalizeMode::Aggressive);
                let text = dedupe_sentences_within_paragraph(&text);
                if text.chars().count() < self.min_paragraph_chars {
                    return None;
                }
                if self.boilerplate.is_boilerplate(&text) {
                    debug!(text = %crate::utils::truncate_for_log(&text, 80), "Dropped boilerplate");
                    return None;
                }
                Some(Fragment::new(text))
            })
            .collect()
    }

    fn has_body_style(&self, style: &str) -> bool {
        style.contains(self.font_family.as_str())
            && self.font_sizes.iter().any(|size| style.contains(size.as_str()))
    }
}

/// Render fragments as one `<p>` element per line.
pub fn render_paragraphs(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .map(|f| format!("<p>{}</p>", partial_escape(f.text.as_str())))
        .collect::<Vec<_>>()
        .join("\n")
}

fn structural_candidates(extractor: &ContentExtractor, document: &Html) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for container in document.select(&extractor.content_wrapper) {
        for leaf in container.select(&extractor.leaf) {
            // a <p> inside a matched <blockquote> is already part of its text
            let nested = leaf
                .ancestors()
                .take_while(|node| node.id() != container.id())
                .filter_map(ElementRef::wrap)
                .any(|ancestor| extractor.leaf.matches(&ancestor));
            if !nested && seen.insert(leaf.id()) {
                out.push(element_text(leaf));
            }
        }
    }
    out
}

fn style_candidates(extractor: &ContentExtractor, document: &Html) -> Vec<String> {
    document
        .select(&PARAGRAPH)
        .filter(|p| {
            p.value()
                .attr("style")
                .is_some_and(|style| extractor.has_body_style(style))
        })
        .map(element_text)
        .collect()
}

fn generic_candidates(extractor: &ContentExtractor, document: &Html) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for container in document.select(&CLASSED_CONTAINER) {
        let matches = container
            .value()
            .attr("class")
            .is_some_and(|class| extractor.generic_class.is_match(class));
        if !matches {
            continue;
        }
        for p in container.select(&PARAGRAPH) {
            if !seen.insert(p.id()) {
                continue;
            }
            let text = element_text(p);
            if collapse_whitespace(&text).chars().count() >= extractor.generic_min_chars {
                out.push(text);
            }
        }
    }
    out
}
