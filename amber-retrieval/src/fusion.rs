//! Weighted Reciprocal Rank Fusion (spec §4.6 step 7). Grounded
//! directly on
//! `examples/original_source/src/core/retrieval/application/search/fusion.py`'s
//! `fuse_results`.

use std::collections::HashMap;

/// One candidate ranked result flowing through fusion and reranking
/// (spec §4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub score: f32,
    pub source: String,
}

/// Reciprocal Rank Fusion: `score(id) = Σ_source weight / (k + rank)`.
/// A chunk surfaced by more than one source is relabeled `"hybrid"`.
/// Ranks within each source's list are 1-based, by input order.
#[must_use]
pub fn fuse(results_by_source: &HashMap<String, Vec<Candidate>>, k: u32, weights: &HashMap<String, f32>) -> Vec<Candidate> {
    let mut fused_scores: HashMap<String, f32> = HashMap::new();
    let mut merged: HashMap<String, Candidate> = HashMap::new();

    for (source, candidates) in results_by_source {
        let weight = weights.get(source).copied().unwrap_or(1.0);

        for (index, candidate) in candidates.iter().enumerate() {
            let rank = (index + 1) as u32;
            let contribution = weight / (k + rank) as f32;

            *fused_scores.entry(candidate.chunk_id.clone()).or_insert(0.0) += contribution;

            merged
                .entry(candidate.chunk_id.clone())
                .and_modify(|existing| {
                    if existing.source != candidate.source {
                        existing.source = "hybrid".to_string();
                    }
                })
                .or_insert_with(|| candidate.clone());
        }
    }

    let mut fused: Vec<Candidate> = merged
        .into_iter()
        .map(|(chunk_id, mut candidate)| {
            candidate.score = fused_scores[&chunk_id];
            candidate
        })
        .collect();

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, source: &str) -> Candidate {
        Candidate { chunk_id: id.to_string(), document_id: "d1".to_string(), content: String::new(), score: 0.0, source: source.to_string() }
    }

    #[test]
    fn single_source_preserves_rank_order() {
        let mut groups = HashMap::new();
        groups.insert("vector".to_string(), vec![candidate("a", "vector"), candidate("b", "vector")]);
        let fused = fuse(&groups, 60, &HashMap::new());
        assert_eq!(fused[0].chunk_id, "a");
        assert!(fused[0].score > fused[1].score);
    }

    #[test]
    fn chunk_found_by_multiple_sources_is_relabeled_hybrid() {
        let mut groups = HashMap::new();
        groups.insert("vector".to_string(), vec![candidate("a", "vector")]);
        groups.insert("graph".to_string(), vec![candidate("a", "graph")]);
        let fused = fuse(&groups, 60, &HashMap::new());
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].source, "hybrid");
    }

    #[test]
    fn weights_bias_the_final_score() {
        let mut groups = HashMap::new();
        groups.insert("vector".to_string(), vec![candidate("a", "vector")]);
        groups.insert("graph".to_string(), vec![candidate("b", "graph")]);

        let mut weights = HashMap::new();
        weights.insert("vector".to_string(), 2.0);
        weights.insert("graph".to_string(), 0.5);

        let fused = fuse(&groups, 60, &weights);
        assert_eq!(fused[0].chunk_id, "a");
    }

    #[test]
    fn exact_rrf_score_matches_the_formula() {
        let mut groups = HashMap::new();
        groups.insert("vector".to_string(), vec![candidate("a", "vector")]);
        let fused = fuse(&groups, 60, &HashMap::new());
        assert!((fused[0].score - (1.0 / 61.0)).abs() < 1e-6);
    }
}
