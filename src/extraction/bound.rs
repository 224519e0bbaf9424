//! Truncation of assembled article HTML to a character budget.
//!
//! Lengths are counted in characters, not bytes. The bounder prefers to cut
//! right after a closing `</p>`; when no paragraph end is close enough it
//! cuts at the budget, backs out of any tag or entity the cut would split,
//! and closes whatever elements are still open.

use once_cell::sync::Lazy;
use regex::Regex;

/// Appended whenever content is cut.
pub const ELLIPSIS: &str = "...";

/// Default distance past the budget a paragraph end may sit (exclusive).
pub const DEFAULT_OVERFLOW_MARGIN: usize = 100;

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)\b[^>]*?(/?)>").expect("TAG regex")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

/// Character budget applied to every rendered article body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthBounder {
    pub max_chars: usize,
    pub overflow_margin: usize,
}

impl LengthBounder {
    pub fn new(max_chars: usize, overflow_margin: usize) -> Self {
        Self {
            max_chars,
            overflow_margin,
        }
    }

    /// Bound `html` with this bounder's budget and margin.
    pub fn bound(&self, html: &str) -> String {
        bound_with_margin(html, self.max_chars, self.overflow_margin)
    }
}

/// Bound `html` to `max_chars` using the default overflow margin.
#[cfg(test)]
pub fn bound(html: &str, max_chars: usize) -> String {
    bound_with_margin(html, max_chars, DEFAULT_OVERFLOW_MARGIN)
}

/// Bound `html` to roughly `max_chars` characters.
///
/// Input already within budget is returned unchanged. Otherwise the cut
/// goes after the last `</p>` that ends before `max_chars + overflow_margin`
/// characters. With no such break the text is cut at `max_chars`, backed out
/// of any partial tag or entity, and open elements are closed after the
/// ellipsis.
///
/// # Arguments
///
/// * `html` - Rendered paragraphs
/// * `max_chars` - Target length in characters
/// * `overflow_margin` - Exclusive slack allowed to reach a paragraph break
///
/// # Returns
///
/// Well-formed HTML no longer than `max_chars + overflow_margin` plus the
/// ellipsis and closing tags.
pub fn bound_with_margin(html: &str, max_chars: usize, overflow_margin: usize) -> String {
    if html.chars().count() <= max_chars {
        return html.to_string();
    }

    if let Some(end) = last_paragraph_end_before(html, max_chars.saturating_add(overflow_margin)) {
        return format!("{}{}", &html[..end], ELLIPSIS);
    }

    hard_truncate(html, max_chars)
}

/// Byte offset just past the last `</p>` ending strictly before `limit` chars.
fn last_paragraph_end_before(html: &str, limit: usize) -> Option<usize> {
    let mut best = None;
    let mut chars_before = 0;
    let mut scanned = 0;
    for (idx, close) in html.match_indices("</p>") {
        let end = idx + close.len();
        chars_before += html[scanned..end].chars().count();
        scanned = end;
        if chars_before >= limit {
            break;
        }
        best = Some(end);
    }
    best
}

fn hard_truncate(html: &str, max_chars: usize) -> String {
    let cut = html
        .char_indices()
        .nth(max_chars)
        .map_or(html.len(), |(i, _)| i);
    let mut prefix = &html[..cut];

    // never leave half a tag
    if let Some(open) = prefix.rfind('<') {
        if prefix[open..].find('>').is_none() {
            prefix = &prefix[..open];
        }
    }
    // nor half an entity
    if let Some(amp) = prefix.rfind('&') {
        let tail = &prefix[amp..];
        if !tail.contains(';') && !tail.contains(char::is_whitespace) && !tail.contains('>') {
            prefix = &prefix[..amp];
        }
    }

    let mut out = prefix.trim_end().to_string();
    out.push_str(ELLIPSIS);
    for name in open_elements(prefix).iter().rev() {
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
    out
}

/// Elements opened in `html` and not yet closed, outermost first.
fn open_elements(html: &str) -> Vec<String> {
    let mut stack: Vec<String> = Vec::new();
    for caps in TAG.captures_iter(html) {
        let name = caps[2].to_ascii_lowercase();
        let closing = !caps[1].is_empty();
        let self_closing = !caps[3].is_empty();
        if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
            continue;
        }
        if closing {
            if let Some(pos) = stack.iter().rposition(|open| *open == name) {
                stack.truncate(pos);
            }
        } else {
            stack.push(name);
        }
    }
    stack
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A `<p>` element exactly `len` characters long.
    fn para(len: usize, fill: char) -> String {
        format!("<p>{}</p>", fill.to_string().repeat(len - 7))
    }

    fn no_unterminated_tag(html: &str) -> bool {
        let opens = html.matches('<').count();
        let closes = html.matches('>').count();
        opens == closes && open_elements(html).is_empty()
    }

    #[test]
    fn test_short_input_unchanged() {
        let html = "<p>short</p>";
        assert_eq!(bound(html, 100), html);
        assert_eq!(bound(html, html.len()), html);
    }

    #[test]
    fn test_breaks_past_margin_are_ignored() {
        // paragraph ends at 900, 1400, 2600 and 3000
        let html = [para(900, 'a'), para(500, 'b'), para(1200, 'c'), para(400, 'd')].concat();
        assert_eq!(html.chars().count(), 3000);

        let out = bound(&html, 2500);
        assert_eq!(out, format!("{}{}", &html[..1400], ELLIPSIS));
        assert!(out.chars().count() <= 2500);
    }

    #[test]
    fn test_break_within_margin_is_used() {
        let html = [para(900, 'a'), para(1650, 'b'), para(450, 'c')].concat();
        let out = bound(&html, 2500);
        assert_eq!(out, format!("{}{}", &html[..2550], ELLIPSIS));
    }

    #[test]
    fn test_hard_truncate_closes_paragraph() {
        let html = format!("<p>{}</p>", "word ".repeat(100));
        let out = bound_with_margin(&html, 50, 0);
        assert!(out.starts_with("<p>word"));
        assert!(out.ends_with("...</p>"));
        assert!(no_unterminated_tag(&out));
    }

    #[test]
    fn test_hard_truncate_never_splits_tag() {
        let html = format!("<p>{}<a href=\"https://example.com/long\">link</a> tail</p>", "x".repeat(40));
        // budget lands inside the <a ...> tag
        let out = bound_with_margin(&html, 50, 0);
        assert_eq!(out, format!("<p>{}...</p>", "x".repeat(40)));
    }

    #[test]
    fn test_hard_truncate_never_splits_entity() {
        let html = format!("<p>{}&amp; more text here</p>", "y".repeat(45));
        let out = bound_with_margin(&html, 50, 0);
        assert_eq!(out, format!("<p>{}...</p>", "y".repeat(45)));
    }

    #[test]
    fn test_multibyte_counted_as_chars() {
        let html = format!("<p>{}</p>", "é".repeat(200));
        let out = bound_with_margin(&html, 103, 0);
        assert_eq!(out.chars().count(), 103 + ELLIPSIS.len() + "</p>".len());
    }

    #[test]
    fn test_length_bound_invariant() {
        let inputs = [
            [para(300, 'a'), para(300, 'b'), para(300, 'c')].concat(),
            format!("<p>{}</p>", "lorem ipsum ".repeat(300)),
            format!("<p>{}</p>\n<p>{}</p>", "q".repeat(50), "r".repeat(5000)),
            "<p>a &amp; b</p>".repeat(200),
        ];
        for html in &inputs {
            for n in [0, 10, 99, 500, 1100, 2500] {
                let out = bound_with_margin(html, n, DEFAULT_OVERFLOW_MARGIN);
                let slack = DEFAULT_OVERFLOW_MARGIN + ELLIPSIS.len() + "</p>".len();
                assert!(out.chars().count() <= n + slack, "too long for n={n}");
                assert!(no_unterminated_tag(&out), "broken tag for n={n}: {out:?}");
            }
        }
    }
}
