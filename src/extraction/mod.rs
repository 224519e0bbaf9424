//! Article body and media extraction from fetched pages.
//!
//! - [`content`]: ordered fallback strategies that locate body paragraphs
//! - [`media`]: figure images with their captions
//! - [`bound`]: character-budget truncation of the rendered body
//!
//! Everything here is synchronous and works on a parsed [`scraper::Html`],
//! which is not `Send`; callers parse and extract without awaiting in between.

pub mod bound;
pub mod content;
pub mod media;

use scraper::{ElementRef, Node, Selector};

use crate::error::{FeedError, Result};

/// Parse a CSS selector taken from configuration.
pub(crate) fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| FeedError::Selector {
        selector: selector.to_string(),
        reason: format!("{e:?}"),
    })
}

/// Elements whose boundaries separate words even without whitespace in the source.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "blockquote", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "figcaption",
    "section", "tr", "td", "th",
];

fn is_block(element: Option<ElementRef<'_>>) -> bool {
    element.is_some_and(|el| BLOCK_ELEMENTS.contains(&el.value().name()))
}

/// Visible text of an element. `<br>` and the edges of nested block
/// elements count as a space.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => {
                if is_block(node.prev_sibling().and_then(ElementRef::wrap)) {
                    out.push(' ');
                }
                out.push_str(text);
            }
            Node::Element(el) if el.name() == "br" => out.push(' '),
            Node::Element(_) if node.id() != element.id() && is_block(ElementRef::wrap(node)) => out.push(' '),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_element_text_joins_inline_markup() {
        let doc = Html::parse_fragment("<p>The <b>ferry</b> runs<br>hourly.</p>");
        let p = doc.select(&compile_selector("p").unwrap()).next().unwrap();
        assert_eq!(element_text(p), "The ferry runs hourly.");
    }

    #[test]
    fn test_element_text_separates_blocks() {
        let doc = Html::parse_fragment("<blockquote><p>One here.</p><p>Two there.</p>tail</blockquote>");
        let quote = doc.select(&compile_selector("blockquote").unwrap()).next().unwrap();
        let text = element_text(quote);
        assert_eq!(text.split_whitespace().collect::<Vec<_>>(), vec!["One", "here.", "Two", "there.", "tail"]);
    }

    #[test]
    fn test_bad_selector_is_error() {
        let err = compile_selector("p[").unwrap_err();
        assert!(matches!(err, FeedError::Selector { .. }));
    }
}
