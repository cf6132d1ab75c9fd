//! Strategy-driven chunking (spec §4.3).

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use amber_core::error::Result;

/// Rough chars-per-token approximation shared with the embedder's
/// fallback tokenizer (spec §4.3 uses the same word-based approximation
/// the original falls back to when no real tokenizer is wired in).
#[must_use]
pub fn approx_token_count(text: &str) -> usize {
    text.chars().count() / 4
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub min_tokens: usize,
    pub respect_sentences: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            overlap_tokens: 64,
            min_tokens: 32,
            respect_sentences: true,
        }
    }
}

/// Selects a chunking config by document domain. Domains tuned for
/// denser or sparser prose get a different window; unrecognized
/// domains fall back to the default sliding-window config.
#[must_use]
pub fn config_for_domain(domain: Option<&str>) -> ChunkingConfig {
    match domain {
        Some("code") => ChunkingConfig {
            max_tokens: 256,
            overlap_tokens: 32,
            min_tokens: 16,
            respect_sentences: false,
        },
        Some("legal") => ChunkingConfig {
            max_tokens: 768,
            overlap_tokens: 96,
            min_tokens: 64,
            respect_sentences: true,
        },
        _ => ChunkingConfig::default(),
    }
}

/// One ordered window of document text (spec §4.3).
#[derive(Debug, Clone)]
pub struct ChunkedText {
    pub index: u32,
    pub content: String,
    pub token_count: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub metadata: HashMap<String, Value>,
}

#[async_trait]
pub trait ChunkingStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn chunk(&self, text: &str, config: &ChunkingConfig) -> Result<Vec<ChunkedText>>;
}

/// Fixed-size overlapping window chunker. Splits on char boundaries
/// only (never inside a UTF-8 code point) and, when
/// `respect_sentences` is set, nudges the boundary back to the nearest
/// sentence end within the window rather than cutting mid-sentence.
#[derive(Debug, Default)]
pub struct SlidingWindowChunker;

impl SlidingWindowChunker {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Chars-per-token is ~4 (matches `approx_token_count`), so a
    /// token budget converts to a char budget by the same factor.
    fn chars_for_tokens(tokens: usize) -> usize {
        tokens.saturating_mul(4).max(1)
    }

    fn find_sentence_boundary(chars: &[char], start: usize, max_end: usize) -> usize {
        for i in (start..max_end).rev() {
            if matches!(chars[i], '.' | '!' | '?') {
                return i + 1;
            }
        }
        max_end
    }
}

#[async_trait]
impl ChunkingStrategy for SlidingWindowChunker {
    fn name(&self) -> &'static str {
        "sliding_window"
    }

    async fn chunk(&self, text: &str, config: &ChunkingConfig) -> Result<Vec<ChunkedText>> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Ok(Vec::new());
        }

        let window = Self::chars_for_tokens(config.max_tokens);
        let overlap = Self::chars_for_tokens(config.overlap_tokens);
        let stride = window.saturating_sub(overlap).max(1);

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0u32;

        while start < chars.len() {
            let raw_end = (start + window).min(chars.len());
            let end = if config.respect_sentences && raw_end < chars.len() {
                let boundary = Self::find_sentence_boundary(&chars, start, raw_end);
                if boundary > start {
                    boundary
                } else {
                    raw_end
                }
            } else {
                raw_end
            };

            let content: String = chars[start..end].iter().collect();
            let token_count = approx_token_count(&content);

            chunks.push(ChunkedText {
                index,
                content,
                token_count,
                start_char: start,
                end_char: end,
                metadata: HashMap::new(),
            });
            index += 1;

            if end >= chars.len() {
                break;
            }
            start += stride;
        }

        Ok(chunks)
    }
}
