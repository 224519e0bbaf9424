//! Removal of sentences and paragraphs the source templates repeat.
//!
//! Both passes keep the first occurrence of each signature and never
//! reorder what survives.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::cleaning::normalizer::collapse_whitespace;
use crate::models::Fragment;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("TAG regex"));

/// Paragraph signature: visible text, lowercased, whitespace collapsed.
pub fn signature(text: &str) -> String {
    let visible = TAG.replace_all(text, " ");
    collapse_whitespace(&visible).to_lowercase()
}

/// Sentence signature: lowercased with punctuation removed.
pub fn sentence_signature(sentence: &str) -> String {
    let kept: String = sentence
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    collapse_whitespace(&kept).to_lowercase()
}

/// Drop every fragment whose signature was already seen.
///
/// Survivors keep their order, and running it twice changes nothing.
pub fn dedupe_paragraphs(fragments: Vec<Fragment>) -> Vec<Fragment> {
    fragments
        .into_iter()
        .unique_by(|f| f.signature.clone())
        .collect()
}

/// Titles and street words that end in a period without ending a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "st", "jr", "sr", "prof", "gov", "sen", "rep", "gen", "lt", "col",
    "capt", "sgt", "rev", "hon", "mt", "ave", "blvd", "rd", "no", "vs", "inc", "co", "corp",
];

/// True when the word ending at `end` (exclusive, just before a period) is
/// an abbreviation or a single-letter initial.
fn is_abbreviation(text: &str, end: usize) -> bool {
    let word = text[..end]
        .rsplit(|c: char| c.is_whitespace() || c == '(' || c == '"')
        .next()
        .unwrap_or("");
    let mut chars = word.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.is_uppercase(),
        (Some(_), Some(_)) => ABBREVIATIONS.contains(&word.to_lowercase().as_str()),
        _ => false,
    }
}

/// Split on `.`, `!` or `?` followed by whitespace. Terminal punctuation
/// stays with its sentence. A period after a known abbreviation ("Mr.",
/// "St.") or an initial is not a boundary.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace())
            && !(c == '.' && is_abbreviation(text, i))
        {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Remove repeated sentences inside one paragraph and rejoin with single spaces.
pub fn dedupe_sentences_within_paragraph(text: &str) -> String {
    split_sentences(text)
        .into_iter()
        .unique_by(|s| sentence_signature(s))
        .join(" ")
}
