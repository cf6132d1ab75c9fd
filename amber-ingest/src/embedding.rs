//! Batched embedding generation with retry (spec §4.3).

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use amber_core::error::{AmberError, Result};
use amber_core::ports::EmbeddingProvider;
use amber_core::types::{SparseEmbedding, SparseEmbeddingOutcome};

use crate::batching::{batch_by_tokens, DEFAULT_MAX_ITEMS_PER_BATCH, DEFAULT_MAX_TOKENS_PER_BATCH};

#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub max_tokens_per_batch: usize,
    pub max_items_per_batch: usize,
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_batch: DEFAULT_MAX_TOKENS_PER_BATCH,
            max_items_per_batch: DEFAULT_MAX_ITEMS_PER_BATCH,
            max_retries: 5,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Full-jitter exponential backoff: `uniform(0, min(cap, base * 2^(attempt-1)))`.
fn backoff_delay(attempt: u32, config: &EmbedderConfig) -> Duration {
    let exp = config.base_backoff.saturating_mul(1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX));
    let capped = exp.min(config.max_backoff);
    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
    Duration::from_secs_f64(capped.as_secs_f64() * jitter)
}

/// Batches texts by token budget and generates dense embeddings,
/// retrying `RateLimit`/`ProviderUnavailable` errors with exponential
/// backoff; other provider errors propagate immediately (spec §4.3).
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    config: EmbedderConfig,
}

impl Embedder {
    #[must_use]
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbedderConfig) -> Self {
        Self { provider, config }
    }

    pub async fn embed_texts(&self, texts: &[String], model: Option<&str>, dimensions: Option<usize>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batches = batch_by_tokens(texts, self.config.max_tokens_per_batch, self.config.max_items_per_batch);
        let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];

        for batch in batches {
            let batch_texts: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
            let response = self.embed_batch_with_retry(&batch_texts, model, dimensions).await?;

            if response.embeddings.len() != batch.len() {
                return Err(AmberError::storage(format!(
                    "embedding provider returned {} vectors for a batch of {}",
                    response.embeddings.len(),
                    batch.len()
                )));
            }

            for ((original_index, _), vector) in batch.into_iter().zip(response.embeddings) {
                out[original_index] = Some(vector);
            }
        }

        Ok(out
            .into_iter()
            .map(|v| v.expect("batch_by_tokens covers every input index exactly once"))
            .collect())
    }

    /// Attempts sparse embedding generation for `texts`, one outcome
    /// per chunk id, zipped positionally (spec §4.2 step 5: best-effort,
    /// a failure here must never fail the embedding stage). No retry:
    /// unlike dense embedding, a missing sparse vector is an accepted
    /// outcome, not an error to recover from.
    pub async fn embed_sparse_best_effort(&self, texts: &[String], chunk_ids: &[String], model: Option<&str>) -> Vec<SparseEmbeddingOutcome> {
        if texts.is_empty() {
            return Vec::new();
        }
        match self.provider.embed_sparse(texts, model).await {
            Ok(Some(weights)) => chunk_ids
                .iter()
                .zip(weights)
                .map(|(chunk_id, weights)| SparseEmbeddingOutcome::Produced(SparseEmbedding { chunk_id: chunk_id.clone(), weights }))
                .collect(),
            Ok(None) => chunk_ids.iter().map(|_| SparseEmbeddingOutcome::SkippedUnsupported).collect(),
            Err(err) => {
                warn!(error = %err, "sparse embedding generation failed, continuing dense-only");
                chunk_ids.iter().map(|_| SparseEmbeddingOutcome::Failed { reason: err.to_string() }).collect()
            }
        }
    }

    async fn embed_batch_with_retry(&self, texts: &[String], model: Option<&str>, dimensions: Option<usize>) -> Result<amber_core::ports::EmbedResponse> {
        let mut attempt = 0u32;
        loop {
            match self.provider.embed(texts, model, dimensions).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(attempt, &self.config);
                    warn!(attempt, ?delay, error = %err, "embedding call failed, retrying with backoff");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
