//! Dense + sparse embeddings (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A dense embedding vector paired one-to-one with a chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenseEmbedding {
    pub chunk_id: String,
    pub vector: Vec<f32>,
}

impl DenseEmbedding {
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// Optional sparse companion: token-id → weight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SparseEmbedding {
    pub chunk_id: String,
    pub weights: HashMap<u32, f32>,
}

/// Outcome of attempting to produce a sparse embedding for a chunk.
/// Sparse generation is always best-effort (spec §4.2 step 5): a
/// failure must never fail the embedding stage, so callers get an
/// explicit outcome rather than a bare `Result`.
#[derive(Debug, Clone)]
pub enum SparseEmbeddingOutcome {
    Produced(SparseEmbedding),
    SkippedUnsupported,
    Failed { reason: String },
}

/// Cosine similarity between two equal-length dense vectors. Returns
/// `0.0` for mismatched lengths or zero-norm vectors rather than
/// panicking, since similarity computation runs over untrusted model
/// output.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_return_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn zero_vector_returns_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
