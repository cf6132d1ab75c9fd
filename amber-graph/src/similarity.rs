//! Intra-document similarity edges (spec §4.4 "Similarity edges").

use amber_core::types::cosine_similarity;

/// One `SIMILAR_TO` edge candidate: `(chunk_a, chunk_b, score, rank)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityEdge {
    pub source: String,
    pub target: String,
    pub score: f32,
    pub rank: u32,
}

/// Pairwise cosine similarity in O(n^2); for each chunk keeps the
/// `top_k` neighbors scoring above `threshold` (spec §4.4).
#[must_use]
pub fn top_k_similarity_edges(chunk_ids: &[String], vectors: &[Vec<f32>], top_k: usize, threshold: f32) -> Vec<SimilarityEdge> {
    let mut edges = Vec::new();

    for (i, source_id) in chunk_ids.iter().enumerate() {
        let mut scored: Vec<(usize, f32)> = chunk_ids
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, _)| (j, cosine_similarity(&vectors[i], &vectors[j])))
            .filter(|(_, score)| *score >= threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        for (rank, (j, score)) in scored.into_iter().enumerate() {
            edges.push(SimilarityEdge {
                source: source_id.clone(),
                target: chunk_ids[j].clone(),
                score,
                rank: rank as u32,
            });
        }
    }

    edges
}
