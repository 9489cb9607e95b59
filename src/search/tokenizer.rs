//! Text normalisation shared by index build and query time.

use lazy_static::lazy_static;
use std::collections::HashSet;

/// Terms shorter than this are discarded.
pub const MIN_TERM_CHARS: usize = 3;

lazy_static! {
    static ref STOP_WORDS: HashSet<&'static str> = [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did",
    ]
    .into_iter()
    .collect();
}

/// Lowercase, replace punctuation with spaces, split on whitespace, then drop
/// short terms and stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
        .collect();

    normalized
        .split_whitespace()
        .filter(|term| term.chars().count() >= MIN_TERM_CHARS)
        .filter(|term| !STOP_WORDS.contains(term))
        .map(str::to_string)
        .collect()
}

pub fn is_stop_word(term: &str) -> bool {
    STOP_WORDS.contains(term)
}
