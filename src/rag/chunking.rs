//! Sentence-aware character splitter used before embedding.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 200,
        }
    }
}

/// A text chunk with its position in the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    /// Character offset in original document
    pub start_offset: usize,
    pub chunk_index: usize,
}

pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    pub fn new(config: SplitterConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        Self {
            config: SplitterConfig {
                chunk_size,
                chunk_overlap: config.chunk_overlap.min(chunk_size / 2),
            },
        }
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Splits `text` into overlapping chunks, preferring to end each chunk on
    /// a sentence boundary. Whitespace-only chunks are dropped.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total_chars {
            let end = (start + chunk_size).min(total_chars);
            let window = &chars[start..end];

            let take = if end < total_chars {
                sentence_boundary(window).unwrap_or(window.len())
            } else {
                window.len()
            };

            let chunk_text: String = window[..take].iter().collect();
            let trimmed = chunk_text.trim();
            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    start_offset: start,
                    chunk_index: chunks.len(),
                });
            }

            if end >= total_chars && take == window.len() {
                break;
            }
            start += take.saturating_sub(overlap).max(1);
        }

        chunks
    }
}

/// Length of the prefix ending at the last sentence break found in the final
/// fifth of `window`.
fn sentence_boundary(window: &[char]) -> Option<usize> {
    let search_start = (window.len() * 80) / 100;
    (search_start..window.len().saturating_sub(1))
        .rev()
        .find(|&i| matches!(window[i], '.' | '!' | '?') && window[i + 1].is_whitespace())
        .map(|i| i + 2)
}
