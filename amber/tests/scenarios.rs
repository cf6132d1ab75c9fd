//! End-to-end scenarios over a freshly built [`CompositionRoot`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};

use amber::adapters::{InMemoryChunkStore, InMemoryDocumentStore, InMemoryTenantStore};
use amber::CompositionRoot;
use amber_config::Settings;
use amber_core::error::{AmberError, Result};
use amber_core::ports::{
    ChunkRepository, ContentExtractor, DocumentRepository, EmbedResponse, EmbeddingProvider,
    ExtractedContent, GenerateRequest, GenerateResponse, GenerateStreamEvent, LLMProvider, Usage,
    VectorHit, VectorStore,
};
use amber_core::types::{Chunk, DocumentStatus, EmbeddingStatus};
use amber_retrieval::{fuse, Candidate, InMemoryVectorStore};
use amber_tenancy::{CapacityLimiter, WorkClass};

struct PassthroughExtractor;

#[async_trait]
impl ContentExtractor for PassthroughExtractor {
    async fn extract(&self, bytes: &[u8], _mime_type: &str, _filename: &str) -> Result<ExtractedContent> {
        Ok(ExtractedContent {
            content: String::from_utf8_lossy(bytes).to_string(),
            metadata: HashMap::new(),
            extractor_used: "passthrough".to_string(),
            confidence: 1.0,
            extraction_time_ms: 1,
        })
    }
}

/// Responds to the classifier's fixed prompt prefix with `"general"`
/// and to everything else with an enrichment JSON blob, mirroring
/// `amber-ingest`'s own orchestrator test double.
struct ScenarioLlm;

#[async_trait]
impl LLMProvider for ScenarioLlm {
    fn name(&self) -> &str {
        "scenario"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let text = if request.prompt.contains("Classify the domain") {
            "general".to_string()
        } else {
            "{\"summary\":\"a test document\",\"document_type\":\"note\",\"hashtags\":[],\"keywords\":[]}".to_string()
        };
        Ok(GenerateResponse {
            text,
            model: "scenario".to_string(),
            provider: "scenario".to_string(),
            usage: Usage::default(),
            finish_reason: "stop".to_string(),
            latency_ms: 1,
            cost_estimate: 0.0,
        })
    }

    async fn generate_stream(&self, _request: GenerateRequest) -> Result<BoxStream<'static, Result<GenerateStreamEvent>>> {
        Err(AmberError::internal("streaming not used in this scenario"))
    }
}

struct StubEmbedder;

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn name(&self) -> &str {
        "stub-embedder"
    }

    async fn embed(&self, texts: &[String], _model: Option<&str>, _dimensions: Option<usize>) -> Result<EmbedResponse> {
        Ok(EmbedResponse {
            embeddings: texts.iter().map(|_| vec![0.1_f32, 0.2, 0.3]).collect(),
            model: "stub-embedder".to_string(),
            dimensions: 3,
            usage: Usage::default(),
            cost_estimate: 0.0,
        })
    }
}

fn build_root() -> CompositionRoot {
    CompositionRoot::with_regex_extraction(
        Settings::default(),
        Arc::new(ScenarioLlm),
        Arc::new(StubEmbedder),
        Arc::new(PassthroughExtractor),
    )
}

#[tokio::test]
async fn idempotent_ingest_returns_the_same_document_id() {
    let root = build_root();
    let first = root.ingestion.register("t1", "a.txt", b"hello world".to_vec(), "text/plain").await.unwrap();
    let second = root.ingestion.register("t1", "a.txt", b"hello world".to_vec(), "text/plain").await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.status, DocumentStatus::Ingested);
}

#[tokio::test]
async fn pipeline_reaches_ready_with_chunks_embeddings_and_graph_edges() {
    let root = build_root();
    let content = b"Anthropic is a company. Claude works for Anthropic.".to_vec();
    let document = root.ingestion.register("t1", "memo.pdf", content, "application/pdf").await.unwrap();

    root.ingestion.process("t1", &document.id).await.unwrap();

    let final_doc = root.documents.get("t1", &document.id).await.unwrap().unwrap();
    assert_eq!(final_doc.status, DocumentStatus::Ready);

    let chunks = root.chunks.get_by_document("t1", &document.id).await.unwrap();
    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|c| c.embedding_status == EmbeddingStatus::Completed));

    let chunk_ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
    let rows = root.vector_store.get_chunks("t1", &chunk_ids).await.unwrap();
    assert_eq!(rows.len(), chunks.len());

    let entities = root.graph_store.entities("t1");
    assert!(entities.iter().any(|e| e.name == "Anthropic"));
    assert!(entities.iter().any(|e| e.name == "Claude"));

    let relations = root.graph_store.relations("t1");
    assert!(relations.iter().any(|r| r.source == "Claude" && r.target == "Anthropic"));

    let anthropic_chunks = root.graph_store.chunks_mentioning("t1", &["Anthropic".to_string()]);
    assert!(!anthropic_chunks.is_empty());
    assert!(chunk_ids.contains(&anthropic_chunks[0].0));
}

#[tokio::test]
async fn upsert_is_idempotent_on_row_count() {
    let store = InMemoryVectorStore::new();
    let chunk = Chunk {
        id: "c1".to_string(),
        tenant_id: "t1".to_string(),
        document_id: "d1".to_string(),
        index: 0,
        content: "alpha".to_string(),
        tokens: 1,
        metadata: HashMap::new(),
        embedding_status: EmbeddingStatus::Completed,
    };
    store.upsert("t1", &[chunk.clone()], &[vec![1.0, 0.0, 0.0]]).await.unwrap();
    store.upsert("t1", &[chunk.clone()], &[vec![1.0, 0.0, 0.0]]).await.unwrap();

    let rows = store.get_chunks("t1", &["c1".to_string()]).await.unwrap();
    assert_eq!(rows.len(), 1);
}

struct StubVectorStore {
    hits: Vec<VectorHit>,
}

#[async_trait]
impl VectorStore for StubVectorStore {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
    async fn upsert(&self, _tenant_id: &str, _chunks: &[Chunk], _vectors: &[Vec<f32>]) -> Result<()> {
        Ok(())
    }
    async fn search(
        &self,
        _tenant_id: &str,
        _query_vector: &[f32],
        _document_ids: Option<&[String]>,
        _limit: usize,
        _score_threshold: Option<f32>,
    ) -> Result<Vec<VectorHit>> {
        Ok(self.hits.clone())
    }
    async fn hybrid_search(
        &self,
        tenant_id: &str,
        dense: &[f32],
        _sparse: Option<&HashMap<u32, f32>>,
        document_ids: Option<&[String]>,
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        self.search(tenant_id, dense, document_ids, limit, None).await
    }
    async fn get_chunks(&self, _tenant_id: &str, ids: &[String]) -> Result<Vec<VectorHit>> {
        Ok(self.hits.iter().filter(|h| ids.contains(&h.chunk_id)).cloned().collect())
    }
    async fn delete_by_document(&self, _tenant_id: &str, _document_id: &str) -> Result<()> {
        Ok(())
    }
    async fn delete_by_tenant(&self, _tenant_id: &str) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn retrieval_surfaces_both_alice_chunks_verbatim_in_the_assembled_prompt() {
    use amber_core::ports::MemoryRepository;
    use amber_generation::{CitedChunk, PromptAssembler};
    use amber_retrieval::{DegradationTracker, EngineConfig, RetrievalEngine};
    use amber_tenancy::{EmbeddingCache, InMemoryKv, ResultCache};

    let alice_engineer = VectorHit {
        chunk_id: "c1".to_string(),
        document_id: "d1".to_string(),
        tenant_id: "t1".to_string(),
        score: 0.9,
        content: "Alice is an engineer.".to_string(),
    };
    let alice_paris = VectorHit {
        chunk_id: "c2".to_string(),
        document_id: "d2".to_string(),
        tenant_id: "t1".to_string(),
        score: 0.9,
        content: "Alice lives in Paris.".to_string(),
    };
    let vector_store = Arc::new(StubVectorStore { hits: vec![alice_engineer, alice_paris] });
    let graph_store = Arc::new(amber_graph::InMemoryGraphStore::new());
    let chunk_repo: Arc<dyn ChunkRepository> = Arc::new(InMemoryChunkStore::new());
    let tenants: Arc<dyn amber_core::ports::TenantRepository> = Arc::new(InMemoryTenantStore::new());
    let kv = Arc::new(InMemoryKv::new());

    let engine = RetrievalEngine::new(
        vector_store,
        graph_store,
        chunk_repo,
        tenants,
        Arc::new(StubEmbedder),
        None,
        None,
        None,
        EmbeddingCache::new(kv.clone() as Arc<dyn amber_core::ports::KV>, 3600),
        ResultCache::new(kv as Arc<dyn amber_core::ports::KV>, 3600),
        DegradationTracker::new(50, 800, 0.5, 0.25),
        EngineConfig::default(),
    );

    let result = engine.search("t1", "Tell me about Alice", &[], None, 10).await.unwrap();
    assert_eq!(result.candidates.len(), 2);

    let memory = amber_generation::InMemoryMemoryStore::new();
    let _ = MemoryRepository::get_user_facts(&memory, "t1", "u1", 10).await.unwrap();

    let citations: Vec<CitedChunk> = result
        .candidates
        .iter()
        .enumerate()
        .map(|(i, c)| CitedChunk { index: i, document_id: c.document_id.clone(), content: c.content.clone() })
        .collect();
    let prompt = PromptAssembler::new(8000).assemble("rules", &[], &[], citations, "Tell me about Alice");

    assert!(prompt.text.contains("Alice is an engineer."));
    assert!(prompt.text.contains("Alice lives in Paris."));
}

#[test]
fn rrf_fusion_matches_the_documented_literal() {
    fn candidate(id: &str, source: &str) -> Candidate {
        Candidate { chunk_id: id.to_string(), document_id: "d1".to_string(), content: String::new(), score: 0.0, source: source.to_string() }
    }

    let mut groups = HashMap::new();
    groups.insert("a".to_string(), vec![candidate("id1", "a"), candidate("id2", "a")]);
    groups.insert("b".to_string(), vec![candidate("id2", "b"), candidate("id3", "b")]);
    let weights = HashMap::from([("a".to_string(), 1.0), ("b".to_string(), 1.0)]);

    let fused = fuse(&groups, 1, &weights);

    let ids: Vec<&str> = fused.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["id2", "id1", "id3"]);

    let id2 = fused.iter().find(|c| c.chunk_id == "id2").unwrap();
    assert!((id2.score - 5.0 / 6.0).abs() < 1e-6);
    assert_eq!(id2.source, "hybrid");

    let id1 = fused.iter().find(|c| c.chunk_id == "id1").unwrap();
    assert!((id1.score - 0.5).abs() < 1e-6);

    let id3 = fused.iter().find(|c| c.chunk_id == "id3").unwrap();
    assert!((id3.score - 1.0 / 3.0).abs() < 1e-6);
}

struct AlwaysFailsProvider;

#[async_trait]
impl LLMProvider for AlwaysFailsProvider {
    fn name(&self) -> &str {
        "p1"
    }
    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
        Err(AmberError::ProviderUnavailable { message: "p1 is down".to_string() })
    }
    async fn generate_stream(&self, _request: GenerateRequest) -> Result<BoxStream<'static, Result<GenerateStreamEvent>>> {
        Err(AmberError::ProviderUnavailable { message: "p1 is down".to_string() })
    }
}

struct AlwaysOkProvider;

#[async_trait]
impl LLMProvider for AlwaysOkProvider {
    fn name(&self) -> &str {
        "p2"
    }
    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
        Ok(GenerateResponse {
            text: "ok".to_string(),
            model: "p2-model".to_string(),
            provider: "p2".to_string(),
            usage: Usage::default(),
            finish_reason: "stop".to_string(),
            latency_ms: 1,
            cost_estimate: 0.0,
        })
    }
    async fn generate_stream(&self, _request: GenerateRequest) -> Result<BoxStream<'static, Result<GenerateStreamEvent>>> {
        let response = self.generate(GenerateRequest::default()).await?;
        Ok(Box::pin(stream::iter(vec![Ok(GenerateStreamEvent::Done(response))])))
    }
}

#[tokio::test]
async fn circuit_breaker_fails_p1_over_to_p2() {
    let root = build_root();
    let chain = root.build_provider_chain(vec![
        ("p1".to_string(), Arc::new(AlwaysFailsProvider) as Arc<dyn LLMProvider>),
        ("p2".to_string(), Arc::new(AlwaysOkProvider) as Arc<dyn LLMProvider>),
    ]);

    let response = chain.generate("t1", "test", GenerateRequest { prompt: "test".to_string(), ..Default::default() }, "req-1").await.unwrap();
    assert_eq!(response.text, "ok");
    assert_eq!(response.provider, "p2");
}

#[tokio::test]
async fn capacity_limiter_reserves_a_chat_slot() {
    let kv = Arc::new(amber_tenancy::InMemoryKv::new());
    let config = amber_config::CapacityConfig {
        total: 3,
        reserved_chat: 1,
        reserved_ingestion: 0,
        lease_ttl_seconds: 600,
        chat_wait_timeout_ms: 50,
        ingestion_wait_timeout_ms: 50,
        communities_wait_timeout_ms: 50,
    };
    let limiter = CapacityLimiter::new(kv as Arc<dyn amber_core::ports::KV>, config, "scenario");

    let first = limiter.try_acquire(WorkClass::Ingestion).await;
    let second = limiter.try_acquire(WorkClass::Ingestion).await;
    assert!(!first.id.is_empty());
    assert!(!second.id.is_empty());

    let third = limiter.try_acquire(WorkClass::Ingestion).await;
    assert!(third.id.is_empty(), "third ingestion lease would leave nothing for the reserved chat slot");

    let chat = limiter.try_acquire(WorkClass::Chat).await;
    assert!(!chat.id.is_empty());
}
