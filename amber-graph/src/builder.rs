//! Graph Builder: drives entity/relation extraction and similarity
//! edges into a `GraphStore` as documents flow through the ingestion
//! pipeline (spec §4.4).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use amber_core::error::Result;
use amber_core::ports::{GraphStatement, GraphStore};
use amber_core::types::Chunk;

use crate::extraction::EntityExtractor;
use crate::similarity::top_k_similarity_edges;
use crate::store::ops;

/// Tunables for similarity-edge construction (spec §4.4 "Similarity
/// edges": top-K=5, threshold=0.7).
#[derive(Debug, Clone, Copy)]
pub struct GraphBuildConfig {
    pub similarity_top_k: usize,
    pub similarity_threshold: f32,
}

impl Default for GraphBuildConfig {
    fn default() -> Self {
        Self { similarity_top_k: 5, similarity_threshold: 0.7 }
    }
}

#[async_trait]
pub trait GraphBuilder: Send + Sync {
    /// MERGE the document and chunk nodes for a whole document and
    /// compute intra-document `SIMILAR_TO` edges from the already
    /// computed chunk embeddings. Called once per document, after
    /// embedding and before per-chunk entity extraction.
    async fn sync_chunks(
        &self,
        tenant_id: &str,
        document_id: &str,
        filename: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        config: &GraphBuildConfig,
    ) -> Result<()>;

    /// Extract entities and relations from a single chunk and MERGE
    /// them into the graph. Called with bounded concurrency across a
    /// document's chunks.
    async fn build_for_chunk(&self, tenant_id: &str, document_id: &str, chunk: &Chunk) -> Result<()>;
}

/// Default `GraphBuilder`: an `EntityExtractor` feeding a `GraphStore`.
pub struct DefaultGraphBuilder {
    graph_store: Arc<dyn GraphStore>,
    extractor: Arc<dyn EntityExtractor>,
}

impl DefaultGraphBuilder {
    #[must_use]
    pub fn new(graph_store: Arc<dyn GraphStore>, extractor: Arc<dyn EntityExtractor>) -> Self {
        Self { graph_store, extractor }
    }
}

#[async_trait]
impl GraphBuilder for DefaultGraphBuilder {
    async fn sync_chunks(
        &self,
        tenant_id: &str,
        document_id: &str,
        filename: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        config: &GraphBuildConfig,
    ) -> Result<()> {
        let mut statements = vec![GraphStatement {
            query: ops::MERGE_DOCUMENT.to_string(),
            params: json!({"id": document_id, "filename": filename}),
        }];

        for chunk in chunks {
            statements.push(GraphStatement {
                query: ops::MERGE_CHUNK.to_string(),
                params: json!({"id": chunk.id, "document_id": document_id}),
            });
        }

        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let edges = top_k_similarity_edges(&chunk_ids, vectors, config.similarity_top_k, config.similarity_threshold);
        for edge in edges {
            statements.push(GraphStatement {
                query: ops::MERGE_SIMILAR_TO.to_string(),
                params: json!({"source": edge.source, "target": edge.target, "score": edge.score, "rank": edge.rank}),
            });
        }

        self.graph_store.execute_write(tenant_id, statements).await
    }

    async fn build_for_chunk(&self, tenant_id: &str, document_id: &str, chunk: &Chunk) -> Result<()> {
        let extracted = self.extractor.extract(&chunk.content).await?;
        if extracted.entities.is_empty() && extracted.relations.is_empty() {
            return Ok(());
        }

        let mut statements = Vec::new();

        for entity in &extracted.entities {
            statements.push(GraphStatement {
                query: ops::MERGE_ENTITY.to_string(),
                params: json!({"name": entity.name, "entity_type": entity.entity_type, "description": entity.description}),
            });
            statements.push(GraphStatement {
                query: ops::MERGE_MENTIONS.to_string(),
                params: json!({"chunk_id": chunk.id, "entity_name": entity.name}),
            });
        }

        for relation in &extracted.relations {
            statements.push(GraphStatement {
                query: ops::MERGE_RELATION.to_string(),
                params: json!({
                    "source": relation.source,
                    "target": relation.target,
                    "relation_type": relation.relation_type,
                    "description": relation.description,
                    "weight": relation.weight,
                }),
            });
        }

        if let Err(err) = self.graph_store.execute_write(tenant_id, statements).await {
            warn!(document_id, chunk_id = %chunk.id, error = %err, "graph write failed for chunk");
            return Err(err);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::RegexEntityExtractor;
    use crate::store::InMemoryGraphStore;
    use amber_core::types::EmbeddingStatus;
    use std::collections::HashMap;

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            document_id: "doc1".to_string(),
            index: 0,
            content: content.to_string(),
            tokens: content.len() / 4,
            metadata: HashMap::new(),
            embedding_status: EmbeddingStatus::Completed,
        }
    }

    #[tokio::test]
    async fn sync_chunks_creates_document_and_chunk_nodes() {
        let store = Arc::new(InMemoryGraphStore::new());
        let builder = DefaultGraphBuilder::new(store.clone(), Arc::new(RegexEntityExtractor::new()));

        let chunks = vec![chunk("c1", "hello"), chunk("c2", "world")];
        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0]];

        builder.sync_chunks("t1", "doc1", "file.txt", &chunks, &vectors, &GraphBuildConfig::default()).await.unwrap();
    }

    #[tokio::test]
    async fn sync_chunks_creates_similarity_edges_above_threshold() {
        let store = Arc::new(InMemoryGraphStore::new());
        let builder = DefaultGraphBuilder::new(store.clone(), Arc::new(RegexEntityExtractor::new()));

        let chunks = vec![chunk("c1", "hello"), chunk("c2", "world")];
        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0]];

        builder.sync_chunks("t1", "doc1", "file.txt", &chunks, &vectors, &GraphBuildConfig::default()).await.unwrap();

        let edges = store.similar_to_edges("t1");
        assert!(edges.iter().any(|(source, target, score, _)| source == "c1" && target == "c2" && *score > 0.99));
    }

    #[tokio::test]
    async fn build_for_chunk_merges_entities_and_relations() {
        let store = Arc::new(InMemoryGraphStore::new());
        let builder = DefaultGraphBuilder::new(store.clone(), Arc::new(RegexEntityExtractor::new()));

        let chunk = chunk("c1", "Alice Smith works for Acme Corp.");
        builder.build_for_chunk("t1", "doc1", &chunk).await.unwrap();

        let entities = store.entities("t1");
        assert!(entities.iter().any(|e| e.name == "Alice Smith"));
        let relations = store.relations("t1");
        assert!(relations.iter().any(|r| r.relation_type == "WORKS_FOR"));
    }

    #[tokio::test]
    async fn build_for_chunk_is_a_noop_when_nothing_is_extracted() {
        let store = Arc::new(InMemoryGraphStore::new());
        let builder = DefaultGraphBuilder::new(store.clone(), Arc::new(RegexEntityExtractor::new()));

        let chunk = chunk("c1", "the quick brown fox");
        builder.build_for_chunk("t1", "doc1", &chunk).await.unwrap();

        assert!(store.entities("t1").is_empty());
    }
}
