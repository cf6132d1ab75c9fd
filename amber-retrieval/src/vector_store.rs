//! In-memory brute-force cosine vector store (spec §4.5). HNSW itself
//! is a Non-goal: the index structure this adapter targets is a single
//! logical per-tenant collection, reimplemented here as an exhaustive
//! scan rather than a real ANN index.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use amber_core::error::Result;
use amber_core::ports::{VectorHit, VectorStore};
use amber_core::types::{cosine_similarity, Chunk};

#[derive(Debug, Clone)]
struct IndexedChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Single logical collection per tenant (spec §4.5), held entirely in
/// memory. `connect`/`disconnect` are no-ops: there is no network
/// client underneath to manage.
#[derive(Default)]
pub struct InMemoryVectorStore {
    tenants: RwLock<HashMap<String, HashMap<String, IndexedChunk>>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    /// Replaces by `chunk_id`; content is truncated to the schema's
    /// 65,530-char field limit (spec §4.5).
    async fn upsert(&self, tenant_id: &str, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        let mut tenants = self.tenants.write();
        let collection = tenants.entry(tenant_id.to_string()).or_default();

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            let mut stored = chunk.clone();
            stored.content = chunk.truncated_content().to_string();
            collection.insert(chunk.id.clone(), IndexedChunk { chunk: stored, vector: vector.clone() });
        }

        Ok(())
    }

    async fn search(
        &self,
        tenant_id: &str,
        query_vector: &[f32],
        document_ids: Option<&[String]>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorHit>> {
        let tenants = self.tenants.read();
        let Some(collection) = tenants.get(tenant_id) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<VectorHit> = collection
            .values()
            .filter(|indexed| document_ids.is_none_or(|ids| ids.contains(&indexed.chunk.document_id)))
            .map(|indexed| VectorHit {
                chunk_id: indexed.chunk.id.clone(),
                document_id: indexed.chunk.document_id.clone(),
                tenant_id: tenant_id.to_string(),
                score: cosine_similarity(query_vector, &indexed.vector),
                content: indexed.chunk.content.clone(),
            })
            .filter(|hit| score_threshold.is_none_or(|threshold| hit.score >= threshold))
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Dense-only fallback: this reference adapter has no sparse
    /// index to fuse against (spec §4.5: "best-effort; may degrade to
    /// dense-only on unsupported engines").
    async fn hybrid_search(
        &self,
        tenant_id: &str,
        dense: &[f32],
        _sparse: Option<&std::collections::HashMap<u32, f32>>,
        document_ids: Option<&[String]>,
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        self.search(tenant_id, dense, document_ids, limit, None).await
    }

    async fn get_chunks(&self, tenant_id: &str, ids: &[String]) -> Result<Vec<VectorHit>> {
        let tenants = self.tenants.read();
        let Some(collection) = tenants.get(tenant_id) else {
            return Ok(Vec::new());
        };

        Ok(ids
            .iter()
            .filter_map(|id| collection.get(id))
            .map(|indexed| VectorHit {
                chunk_id: indexed.chunk.id.clone(),
                document_id: indexed.chunk.document_id.clone(),
                tenant_id: tenant_id.to_string(),
                score: 0.0,
                content: indexed.chunk.content.clone(),
            })
            .collect())
    }

    async fn delete_by_document(&self, tenant_id: &str, document_id: &str) -> Result<()> {
        let mut tenants = self.tenants.write();
        if let Some(collection) = tenants.get_mut(tenant_id) {
            collection.retain(|_, indexed| indexed.chunk.document_id != document_id);
        }
        Ok(())
    }

    async fn delete_by_tenant(&self, tenant_id: &str) -> Result<()> {
        self.tenants.write().remove(tenant_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_core::types::EmbeddingStatus;

    fn chunk(id: &str, document_id: &str, content: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            document_id: document_id.to_string(),
            index: 0,
            content: content.to_string(),
            tokens: content.len() / 4,
            metadata: HashMap::new(),
            embedding_status: EmbeddingStatus::Completed,
        }
    }

    #[tokio::test]
    async fn search_returns_results_sorted_by_descending_score() {
        let store = InMemoryVectorStore::new();
        let chunks = vec![chunk("a", "d1", "alpha"), chunk("b", "d1", "beta")];
        let vectors = vec![vec![0.9, 0.1], vec![1.0, 0.0]];
        store.upsert("t1", &chunks, &vectors).await.unwrap();

        let hits = store.search("t1", &[1.0, 0.0], None, 10, None).await.unwrap();
        assert_eq!(hits[0].chunk_id, "b");
    }

    #[tokio::test]
    async fn search_is_tenant_isolated() {
        let store = InMemoryVectorStore::new();
        store.upsert("t1", &[chunk("a", "d1", "alpha")], &[vec![1.0, 0.0]]).await.unwrap();
        let hits = store.search("t2", &[1.0, 0.0], None, 10, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn search_respects_document_id_filter() {
        let store = InMemoryVectorStore::new();
        let chunks = vec![chunk("a", "d1", "alpha"), chunk("b", "d2", "beta")];
        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        store.upsert("t1", &chunks, &vectors).await.unwrap();

        let hits = store.search("t1", &[1.0, 0.0], Some(&["d1".to_string()]), 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "a");
    }

    #[tokio::test]
    async fn delete_by_document_removes_only_that_documents_chunks() {
        let store = InMemoryVectorStore::new();
        let chunks = vec![chunk("a", "d1", "alpha"), chunk("b", "d2", "beta")];
        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        store.upsert("t1", &chunks, &vectors).await.unwrap();

        store.delete_by_document("t1", "d1").await.unwrap();
        let hits = store.search("t1", &[1.0, 0.0], None, 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "b");
    }
}
