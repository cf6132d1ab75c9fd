//! Bounded beam-search graph traversal (spec §4.6 "Traversal beam
//! search"). Grounded on
//! `examples/original_source/src/core/retrieval/application/search/graph_traversal.py`'s
//! `GraphTraversalService.beam_search`, reimplemented directly over
//! `amber_graph::InMemoryGraphStore`'s accessor methods rather than a
//! single Cypher round-trip (there is no query planner to exploit
//! here).

use std::collections::HashSet;
use std::time::{Duration, Instant};

use amber_core::types::TRAVERSAL_EXCLUDED_RELATION_TYPES;
use amber_graph::InMemoryGraphStore;
use tracing::warn;

use crate::fusion::Candidate;

/// Graph-reasoning hits are scored at a fixed confidence rather than
/// a measured similarity (spec §4.6, original's `score=0.7`).
const GRAPH_HIT_SCORE: f32 = 0.7;

/// Expands from `seed_entities` up to `depth` hops, keeping the
/// top-`beam_width` neighbors per hop ranked by edge weight and
/// excluding structural relation types. Returns as soon as `timeout`
/// elapses, yielding whatever was found so far — never an error.
pub fn beam_search(
    store: &InMemoryGraphStore,
    tenant_id: &str,
    seed_entities: &[String],
    depth: u32,
    beam_width: usize,
    timeout: Duration,
) -> Vec<Candidate> {
    if seed_entities.is_empty() {
        return Vec::new();
    }

    let deadline = Instant::now() + timeout;
    let relations = store.relations(tenant_id);

    let mut visited: HashSet<String> = seed_entities.iter().cloned().collect();
    let mut frontier: Vec<String> = seed_entities.to_vec();
    let mut reached: HashSet<String> = HashSet::new();

    for _ in 0..depth {
        if Instant::now() >= deadline {
            warn!(tenant_id, "graph beam search timed out, returning partial results");
            break;
        }

        let mut next_frontier = Vec::new();
        for entity in &frontier {
            let mut neighbors: Vec<(String, f32)> = relations
                .iter()
                .filter(|r| !TRAVERSAL_EXCLUDED_RELATION_TYPES.contains(&r.relation_type.as_str()))
                .filter_map(|r| {
                    if r.source == *entity && !visited.contains(&r.target) {
                        Some((r.target.clone(), r.weight))
                    } else if r.target == *entity && !visited.contains(&r.source) {
                        Some((r.source.clone(), r.weight))
                    } else {
                        None
                    }
                })
                .collect();

            neighbors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            neighbors.truncate(beam_width);

            for (neighbor, _) in neighbors {
                if visited.insert(neighbor.clone()) {
                    reached.insert(neighbor.clone());
                    next_frontier.push(neighbor);
                }
            }
        }

        frontier = next_frontier;
        if frontier.is_empty() {
            break;
        }
    }

    let reached: Vec<String> = reached.into_iter().collect();
    store
        .chunks_mentioning(tenant_id, &reached)
        .into_iter()
        .map(|(chunk_id, document_id)| Candidate {
            chunk_id,
            document_id,
            content: String::new(),
            score: GRAPH_HIT_SCORE,
            source: "graph".to_string(),
        })
        .collect()
}
