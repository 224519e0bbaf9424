//! Repair of mis-encoded punctuation, entities and spacing in free text.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

use crate::config::GarbledRule;
use crate::error::Result;

/// Quote, apostrophe, dash, ellipsis and space entities. `&amp;` is left
/// alone on purpose so that decoding never produces a new entity.
static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|([a-zA-Z]{2,8}));").expect("ENTITY regex")
});

static NON_ASCII: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\x00-\x7F]+").expect("NON_ASCII regex"));

/// How much non-ASCII text survives normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeMode {
    /// Titles, descriptions and captions: only known-bad sequences change.
    Gentle,
    /// Article body text: anything non-ASCII left after repair is dropped.
    Aggressive,
}

/// Text normalizer built from a garbled-sequence table.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Alternation of every table entry, longest first, so that a sequence
    /// always wins over its own prefixes at the same position.
    garbled: Option<Regex>,
    replacements: HashMap<String, String>,
    sentinel: Option<String>,
}

impl Normalizer {
    /// Compile the garbled-text table into a single matcher.
    ///
    /// # Arguments
    ///
    /// * `table` - Literal replacements; entries with an empty `from` are ignored
    /// * `sentinel` - Teaser marker; text containing it is never rewritten
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::FeedError::Pattern`] if the combined pattern
    /// exceeds the regex size limit.
    pub fn new(table: &[GarbledRule], sentinel: Option<String>) -> Result<Self> {
        let mut rules: Vec<&GarbledRule> = table.iter().filter(|r| !r.from.is_empty()).collect();
        // stable: equal lengths keep table order
        rules.sort_by(|a, b| b.from.chars().count().cmp(&a.from.chars().count()));

        let mut replacements = HashMap::with_capacity(rules.len());
        let mut alternatives = Vec::with_capacity(rules.len());
        for rule in rules {
            if replacements.contains_key(&rule.from) {
                continue;
            }
            replacements.insert(rule.from.clone(), rule.to.clone());
            alternatives.push(regex::escape(&rule.from));
        }

        let garbled = if alternatives.is_empty() {
            None
        } else {
            Some(Regex::new(&alternatives.join("|"))?)
        };

        Ok(Self {
            garbled,
            replacements,
            sentinel: sentinel.filter(|s| !s.is_empty()),
        })
    }

    /// True when `text` carries the teaser sentinel.
    pub fn is_teaser(&self, text: &str) -> bool {
        self.sentinel.as_deref().is_some_and(|s| text.contains(s))
    }

    /// Normalize `text`. Text containing the teaser sentinel is returned unchanged.
    ///
    /// Garbled sequences are replaced first. Aggressive mode then drops
    /// remaining non-ASCII characters. Both modes decode punctuation
    /// entities and collapse whitespace. Applying it twice gives the same
    /// result as once.
    ///
    /// # Arguments
    ///
    /// * `text` - Raw text from the feed or a page
    /// * `mode` - [`NormalizeMode::Gentle`] for metadata and captions,
    ///   [`NormalizeMode::Aggressive`] for body paragraphs
    pub fn normalize(&self, text: &str, mode: NormalizeMode) -> String {
        if self.is_teaser(text) {
            return text.to_string();
        }

        let repaired = match &self.garbled {
            Some(re) => re
                .replace_all(text, |caps: &Captures| {
                    self.replacements
                        .get(&caps[0])
                        .cloned()
                        .unwrap_or_else(|| caps[0].to_string())
                })
                .into_owned(),
            None => text.to_string(),
        };

        let repaired = match mode {
            NormalizeMode::Gentle => repaired,
            NormalizeMode::Aggressive => NON_ASCII.replace_all(&repaired, "").into_owned(),
        };

        let decoded = decode_punctuation_entities(&repaired);
        collapse_whitespace(&decoded)
    }
}

/// Decode the entities used for quotes, apostrophes and dashes. Unknown
/// entities pass through untouched.
pub fn decode_punctuation_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let code = if let Some(dec) = caps.get(1) {
                dec.as_str().parse::<u32>().ok()
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok()
            } else {
                None
            };
            let replacement = match (code, caps.get(3).map(|m| m.as_str())) {
                (Some(34), _) | (_, Some("quot")) => "\"",
                (Some(39), _) | (_, Some("apos")) => "'",
                (Some(8216 | 8217 | 8218), _) | (_, Some("lsquo" | "rsquo" | "sbquo")) => "'",
                (Some(8220 | 8221 | 8222), _) | (_, Some("ldquo" | "rdquo" | "bdquo")) => "\"",
                (Some(8211 | 8212), _) | (_, Some("ndash" | "mdash")) => "-",
                (Some(8230), _) | (_, Some("hellip")) => "...",
                (Some(160), _) | (_, Some("nbsp")) => " ",
                _ => return caps[0].to_string(),
            };
            replacement.to_string()
        })
        .into_owned()
}

/// Collapse whitespace runs (including non-breaking spaces) to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_TEASER_SENTINEL, default_garbled_table};

    fn normalizer() -> Normalizer {
        Normalizer::new(&default_garbled_table(), Some(DEFAULT_TEASER_SENTINEL.to_string())).unwrap()
    }

    #[test]
    fn test_mac_roman_apostrophes() {
        let n = normalizer();
        assert_eq!(
            n.normalize("The mayor‚Äôs office didn‚Äôt reply", NormalizeMode::Gentle),
            "The mayor's office didn't reply"
        );
        assert_eq!(
            n.normalize("‚ÄúWe‚Äôre ready,‚Äù she said", NormalizeMode::Gentle),
            "\"We're ready,\" she said"
        );
    }

    #[test]
    fn test_longest_sequence_wins_over_prefix() {
        let n = normalizer();
        // "â€" alone maps to a quote; "â€™" must not become `"™`
        assert_eq!(n.normalize("it\u{e2}\u{20ac}\u{2122}s", NormalizeMode::Gentle), "it's");
        assert_eq!(n.normalize("â€œHiâ€ there", NormalizeMode::Gentle), "\"Hi\" there");
    }

    #[test]
    fn test_table_order_does_not_matter() {
        let mut reversed = default_garbled_table();
        reversed.reverse();
        let n = Normalizer::new(&reversed, None).unwrap();
        assert_eq!(n.normalize("don‚Äôt and donâ€™t", NormalizeMode::Gentle), "don't and don't");
    }

    #[test]
    fn test_entities_decoded() {
        let n = normalizer();
        assert_eq!(
            n.normalize("&ldquo;Yes&rdquo; &#8212; it&#39;s &hellip;", NormalizeMode::Gentle),
            "\"Yes\" - it's ..."
        );
        assert_eq!(n.normalize("a&#x2019;b", NormalizeMode::Gentle), "a'b");
    }

    #[test]
    fn test_unknown_entities_and_amp_pass_through() {
        let n = normalizer();
        assert_eq!(n.normalize("Tom &amp; Jerry &copy;", NormalizeMode::Gentle), "Tom &amp; Jerry &copy;");
    }

    #[test]
    fn test_whitespace_collapsed() {
        let n = normalizer();
        assert_eq!(n.normalize("  one\n\t two¬†three\u{a0} ", NormalizeMode::Gentle), "one two three");
    }

    #[test]
    fn test_gentle_keeps_real_unicode() {
        let n = normalizer();
        assert_eq!(n.normalize("Café “quoted” – ok", NormalizeMode::Gentle), "Café “quoted” – ok");
    }

    #[test]
    fn test_aggressive_strips_remaining_non_ascii() {
        let n = normalizer();
        assert_eq!(n.normalize("Café ‚Äôs “quoted”", NormalizeMode::Aggressive), "Caf 's quoted");
    }

    #[test]
    fn test_teaser_returned_unchanged() {
        let n = normalizer();
        let teaser = format!("  {DEFAULT_TEASER_SENTINEL}‚Äô  ");
        assert_eq!(n.normalize(&teaser, NormalizeMode::Aggressive), teaser);
        assert!(n.is_teaser(&teaser));
        assert!(!n.is_teaser("ordinary text"));
    }

    #[test]
    fn test_empty_table() {
        let n = Normalizer::new(&[], None).unwrap();
        assert_eq!(n.normalize(" a‚Äôb ", NormalizeMode::Gentle), "a‚Äôb");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let n = normalizer();
        let samples = [
            "plain ascii text.",
            "‚Äôs‚Äô‚Äò‚Äú‚Äù¬†‚Äî‚Äì‚Ä¶",
            "â€™â€˜â€œâ€\u{9d}â€”â€“â€¦Â\u{a0}â€",
            "Itâ€™s   a  â€œtestâ€ ‚Äôt ",
            "&quot;x&quot; &amp;quot; &#8217;",
            "â€â€â€™",
            "   ",
            "",
        ];
        for mode in [NormalizeMode::Gentle, NormalizeMode::Aggressive] {
            for sample in samples {
                let once = n.normalize(sample, mode);
                assert_eq!(n.normalize(&once, mode), once, "not idempotent for {sample:?}");
            }
        }
    }
}
