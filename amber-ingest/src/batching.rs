//! Token-aware batching for embedding calls (spec §4.3).
//!
//! Grounded on `examples/original_source/src/core/utils/batching.py`'s
//! `batch_by_tokens`: a fixed per-batch token cap and item cap, with
//! oversized single texts spilling into their own singleton batch.

use tracing::warn;

use crate::chunking::approx_token_count;

/// Default per-batch token cap (spec §4.3).
pub const DEFAULT_MAX_TOKENS_PER_BATCH: usize = 8_000;
/// Default per-batch item cap (spec §4.3).
pub const DEFAULT_MAX_ITEMS_PER_BATCH: usize = 2_048;

/// Split `texts` into batches of `(original_index, text)` pairs such
/// that no batch exceeds `max_tokens_per_batch` tokens or
/// `max_items_per_batch` items, except a text that alone exceeds the
/// token cap, which becomes its own batch with a logged warning.
#[must_use]
pub fn batch_by_tokens(
    texts: &[String],
    max_tokens_per_batch: usize,
    max_items_per_batch: usize,
) -> Vec<Vec<(usize, String)>> {
    if texts.is_empty() {
        return Vec::new();
    }

    let mut batches: Vec<Vec<(usize, String)>> = Vec::new();
    let mut current: Vec<(usize, String)> = Vec::new();
    let mut current_tokens = 0usize;

    for (idx, text) in texts.iter().enumerate() {
        let tokens = approx_token_count(text);

        let would_exceed_tokens = current_tokens + tokens > max_tokens_per_batch;
        let would_exceed_items = current.len() >= max_items_per_batch;

        if !current.is_empty() && (would_exceed_tokens || would_exceed_items) {
            batches.push(std::mem::take(&mut current));
            current_tokens = 0;
        }

        if tokens > max_tokens_per_batch {
            warn!(index = idx, tokens, max_tokens_per_batch, "text exceeds max batch token cap, placing in its own batch");
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            batches.push(vec![(idx, text.clone())]);
            continue;
        }

        current.push((idx, text.clone()));
        current_tokens += tokens;
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}
