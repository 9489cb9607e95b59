//! Word-by-word reveal of an answer.
//!
//! The chunk sequence is lazy and restartable; pacing belongs to the caller.

use futures::stream::{self, Stream, StreamExt};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typewriter {
    text: String,
}

impl Typewriter {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Chunks that concatenate back to the original text. Each chunk is a
    /// word followed by the whitespace after it; leading whitespace stays
    /// attached to the first chunk.
    pub fn chunks(&self) -> impl Iterator<Item = &str> + '_ {
        let text = self.text.as_str();
        let mut pos = 0;
        std::iter::from_fn(move || {
            if pos >= text.len() {
                return None;
            }
            let rest = &text[pos..];
            let word_start = rest.len() - rest.trim_start().len();
            let after_word = rest[word_start..]
                .find(char::is_whitespace)
                .map(|i| word_start + i)
                .unwrap_or(rest.len());
            let end = rest[after_word..]
                .find(|c: char| !c.is_whitespace())
                .map(|i| after_word + i)
                .unwrap_or(rest.len());
            pos += end;
            Some(&rest[..end])
        })
    }

    pub fn len(&self) -> usize {
        self.chunks().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The same chunks as an async stream, waiting `delay` before every chunk
    /// after the first.
    pub fn into_stream(self, delay: Duration) -> impl Stream<Item = String> {
        let chunks: Vec<String> = self.chunks().map(String::from).collect();
        stream::iter(chunks.into_iter().enumerate()).then(move |(i, chunk)| async move {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            chunk
        })
    }
}
