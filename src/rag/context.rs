//! Bounded context block built from ranked search results.
//!
//! Token cost is estimated as `ceil(chars / 4)` over the whole emitted text,
//! separators and headers included, and never exceeds the budget.

use crate::config::{RagConfig, SearchMode};
use crate::search::SearchResult;

/// Emitted when there is nothing to ground the answer on.
pub const NO_CONTEXT_SENTINEL: &str =
    "No specific information found in the knowledge base for this question.";

pub const SEPARATOR: &str = "\n\n---\n\n";

const ELLIPSIS: &str = "...";
const CHARS_PER_TOKEN: usize = 4;

pub fn estimate_tokens(text: &str) -> usize {
    estimate_tokens_for_chars(text.chars().count())
}

fn estimate_tokens_for_chars(chars: usize) -> usize {
    chars.div_ceil(CHARS_PER_TOKEN)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub text: String,
    /// Ids of the documents that made it into `text`, in order
    pub included: Vec<String>,
    /// Whether the last included document was cut short
    pub truncated: bool,
    pub estimated_tokens: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_tokens: usize,
    max_results: usize,
    min_fragment_chars: usize,
}

impl ContextAssembler {
    pub fn new(max_tokens: usize, max_results: usize, min_fragment_chars: usize) -> Self {
        Self {
            max_tokens,
            max_results,
            min_fragment_chars,
        }
    }

    pub fn assemble(&self, results: &[SearchResult]) -> AssembledContext {
        let budget_chars = self.max_tokens.saturating_mul(CHARS_PER_TOKEN);
        let separator_chars = SEPARATOR.chars().count();

        let mut text = String::new();
        let mut used_chars = 0usize;
        let mut included = Vec::new();
        let mut truncated = false;

        for result in results.iter().take(self.max_results) {
            let header = header(result);
            let content = result.document.content.trim();
            let lead_chars = if included.is_empty() { 0 } else { separator_chars };

            let header_chars = header.chars().count() + 1;
            let content_chars = content.chars().count();
            let full_chars = lead_chars + header_chars + content_chars;

            if used_chars + full_chars <= budget_chars {
                push_part(&mut text, lead_chars > 0, &header, content);
                used_chars += full_chars;
                included.push(result.document.id.clone());
                continue;
            }

            let room = budget_chars
                .saturating_sub(used_chars + lead_chars + header_chars + ELLIPSIS.len());
            if room >= self.min_fragment_chars && room > 0 {
                let fragment: String = content.chars().take(room).collect();
                let fragment = format!("{}{}", fragment.trim_end(), ELLIPSIS);
                used_chars += lead_chars + header_chars + fragment.chars().count();
                push_part(&mut text, lead_chars > 0, &header, &fragment);
                included.push(result.document.id.clone());
                truncated = true;
            }
            break;
        }

        if included.is_empty() {
            let text = if estimate_tokens(NO_CONTEXT_SENTINEL) <= self.max_tokens {
                NO_CONTEXT_SENTINEL.to_string()
            } else {
                String::new()
            };
            let estimated_tokens = estimate_tokens(&text);
            return AssembledContext {
                text,
                included,
                truncated: false,
                estimated_tokens,
            };
        }

        AssembledContext {
            estimated_tokens: estimate_tokens_for_chars(used_chars),
            text,
            included,
            truncated,
        }
    }
}

impl From<&RagConfig> for ContextAssembler {
    fn from(config: &RagConfig) -> Self {
        Self::new(
            config.context_max_tokens,
            config.context_max_results,
            config.min_fragment_chars,
        )
    }
}

fn push_part(text: &mut String, with_separator: bool, header: &str, content: &str) {
    if with_separator {
        text.push_str(SEPARATOR);
    }
    text.push_str(header);
    text.push('\n');
    text.push_str(content);
}

/// `[section or type] (signal)`
fn header(result: &SearchResult) -> String {
    let signal = match (result.search_type, result.vector_score, result.bm25_score) {
        (SearchMode::Hybrid, Some(v), Some(k)) => {
            format!("Hybrid: V={:.1}%, K={:.1}%", v * 100.0, k * 100.0)
        }
        (SearchMode::Hybrid, _, _) => "Vector+BM25".to_string(),
        (SearchMode::Vector, _, _) => "Semantic".to_string(),
        (SearchMode::Bm25, _, _) => "BM25".to_string(),
    };
    format!("[{}] ({})", result.document.label(), signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{Document, DocumentType};

    fn result(id: &str, content: &str, section: Option<&str>) -> SearchResult {
        SearchResult::bm25(
            Document::new(id, content, "test.md", section.map(String::from), DocumentType::Research, 5),
            1.0,
        )
    }

    #[test]
    fn test_empty_results_give_sentinel() {
        let assembled = ContextAssembler::new(2000, 8, 100).assemble(&[]);
        assert_eq!(assembled.text, NO_CONTEXT_SENTINEL);
        assert!(assembled.is_empty());
    }

    #[test]
    fn test_headers_and_separator() {
        let mut hybrid = result("b", "Second document body", None);
        hybrid.search_type = SearchMode::Hybrid;
        hybrid.vector_score = Some(0.8);

        let assembled = ContextAssembler::new(2000, 8, 100).assemble(&[
            result("a", "  First document body  ", Some("Education")),
            hybrid,
        ]);

        assert_eq!(
            assembled.text,
            "[Education] (BM25)\nFirst document body\n\n---\n\n[research] (Hybrid: V=80.0%, K=100.0%)\nSecond document body"
        );
        assert_eq!(assembled.included, vec!["a", "b"]);
        assert_eq!(assembled.estimated_tokens, estimate_tokens(&assembled.text));
    }

    #[test]
    fn test_max_results() {
        let results: Vec<_> = (0..5).map(|i| result(&format!("d{}", i), "short", None)).collect();
        let assembled = ContextAssembler::new(2000, 3, 100).assemble(&results);
        assert_eq!(assembled.included.len(), 3);
    }

    #[test]
    fn test_oversized_document_is_truncated() {
        let long = "word ".repeat(400);
        let assembled = ContextAssembler::new(100, 8, 100).assemble(&[result("big", &long, None)]);

        assert_eq!(assembled.included, vec!["big"]);
        assert!(assembled.truncated);
        assert!(assembled.text.ends_with("..."));
        assert!(estimate_tokens(&assembled.text) <= 100);
    }

    #[test]
    fn test_fragment_below_minimum_is_dropped() {
        let first = "a".repeat(300);
        let second = "b".repeat(300);
        let assembled = ContextAssembler::new(100, 8, 100)
            .assemble(&[result("one", &first, None), result("two", &second, None)]);

        assert_eq!(assembled.included, vec!["one"]);
        assert!(!assembled.truncated);
    }

    #[test]
    fn test_budget_never_exceeded() {
        let results: Vec<_> = (0..20)
            .map(|i| result(&format!("d{}", i), &"lorem ipsum dolor ".repeat(i * 7 + 1), None))
            .collect();

        for budget in [0, 1, 10, 40, 75, 150, 400, 1200] {
            for min_fragment in [0, 20, 100] {
                let assembled = ContextAssembler::new(budget, 20, min_fragment).assemble(&results);
                assert!(
                    estimate_tokens(&assembled.text) <= budget,
                    "budget {} exceeded: {}",
                    budget,
                    estimate_tokens(&assembled.text)
                );
            }
        }
    }
}
