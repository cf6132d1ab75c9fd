//! Explicit composition root (spec §9: "replace global singletons /
//! module-level state with an explicit composition root that
//! constructs each adapter once at startup and injects it into
//! components via constructor parameters"). Grounded on
//! `llmspell-providers::abstraction::ProviderManager`'s
//! explicit-construction shape, generalized from "one kind of thing"
//! to the whole service's dependency graph.
//!
//! Tests build a fresh [`CompositionRoot`] per case rather than
//! sharing process-global state.

use std::sync::Arc;
use std::time::Duration;

use amber_config::Settings;
use amber_core::ports::{EmbeddingProvider, KV};
use amber_core::ports::{LLMProvider, RerankerProvider};
use amber_events::bus::EventBus;
use amber_events::state_machine::DocumentStateMachine;
use amber_generation::GenerationService;
use amber_graph::{DefaultGraphBuilder, EntityExtractor, InMemoryGraphStore, RegexEntityExtractor};
use amber_ingest::embedding::{Embedder, EmbedderConfig};
use amber_ingest::orchestrator::IngestionOrchestrator;
use amber_providers::{ProviderOrchestrator, UsageLog};
use amber_retrieval::{DegradationTracker, EngineConfig, InMemoryVectorStore, RetrievalEngine};
use amber_tenancy::{CapacityLimiter, EmbeddingCache, InMemoryKv, RateLimiter, ResultCache};

use crate::adapters::{InMemoryChunkStore, InMemoryDocumentStore, InMemoryObjectStore, InMemoryTenantStore};

/// Everything the service needs to ingest and answer queries, built
/// once and shared via `Arc` the way a real process would construct it
/// at startup. In-memory adapters stand in for the storage ports the
/// spec treats as external collaborators (§1's Non-goals).
pub struct CompositionRoot {
    pub settings: Settings,
    pub documents: Arc<InMemoryDocumentStore>,
    pub chunks: Arc<InMemoryChunkStore>,
    pub tenants: Arc<InMemoryTenantStore>,
    pub objects: Arc<InMemoryObjectStore>,
    pub kv: Arc<InMemoryKv>,
    pub graph_store: Arc<InMemoryGraphStore>,
    pub vector_store: Arc<InMemoryVectorStore>,
    pub event_bus: Arc<EventBus>,
    pub state_machine: Arc<DocumentStateMachine>,
    pub usage_log: Arc<UsageLog>,
    pub capacity: Arc<CapacityLimiter>,
    pub rate_limiter: Arc<RateLimiter>,
    pub ingestion: IngestionOrchestrator,
    pub retrieval: RetrievalEngine,
    pub generation: GenerationService,
}

impl CompositionRoot {
    /// Wires every component against a single LLM/embedding provider
    /// pair — enough for ingest/retrieval/generation scenarios. Use
    /// [`ProviderOrchestrator`] directly (see `build_provider_chain`)
    /// for scenarios that exercise failover across multiple providers.
    #[must_use]
    pub fn new(
        settings: Settings,
        llm: Arc<dyn LLMProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        reranker: Option<Arc<dyn RerankerProvider>>,
        extractor: Arc<dyn EntityExtractor>,
        content_extractor: Arc<dyn amber_core::ports::ContentExtractor>,
    ) -> Self {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let chunks = Arc::new(InMemoryChunkStore::new());
        let tenants = Arc::new(InMemoryTenantStore::new());
        let objects = Arc::new(InMemoryObjectStore::new());
        let kv: Arc<InMemoryKv> = Arc::new(InMemoryKv::new());
        let graph_store = Arc::new(InMemoryGraphStore::new());
        let vector_store = Arc::new(InMemoryVectorStore::new());
        let event_bus = Arc::new(EventBus::new());
        let state_machine = Arc::new(DocumentStateMachine::new(documents.clone(), event_bus.clone()));
        let usage_log = Arc::new(UsageLog::new());

        let capacity = Arc::new(CapacityLimiter::new(kv.clone() as Arc<dyn KV>, settings.capacity.clone(), "default"));
        let rate_limiter = Arc::new(RateLimiter::new(kv.clone() as Arc<dyn KV>, settings.rate_limit.clone()));

        let embedder_svc = Embedder::new(embedder.clone(), EmbedderConfig::default());
        let graph_builder = Arc::new(DefaultGraphBuilder::new(graph_store.clone(), extractor));

        let ingestion = IngestionOrchestrator::new(
            documents.clone() as Arc<dyn amber_core::ports::DocumentRepository>,
            chunks.clone() as Arc<dyn amber_core::ports::ChunkRepository>,
            tenants.clone() as Arc<dyn amber_core::ports::TenantRepository>,
            objects.clone() as Arc<dyn amber_core::ports::ObjectStorage>,
            content_extractor,
            llm.clone(),
            embedder_svc,
            vector_store.clone() as Arc<dyn amber_core::ports::VectorStore>,
            graph_builder,
            state_machine.clone(),
            usage_log.clone(),
            &settings,
        );

        let embedding_cache = EmbeddingCache::new(kv.clone() as Arc<dyn KV>, settings.embedding_cache_ttl_seconds);
        let result_cache = ResultCache::new(kv.clone() as Arc<dyn KV>, settings.result_cache_ttl_seconds);
        let degradation = DegradationTracker::new(
            settings.retrieval_latency_window,
            settings.retrieval_latency_threshold_ms,
            settings.retrieval_degraded_enter_fraction,
            settings.retrieval_degraded_exit_fraction,
        );

        let retrieval = RetrievalEngine::new(
            vector_store.clone() as Arc<dyn amber_core::ports::VectorStore>,
            graph_store.clone(),
            chunks.clone() as Arc<dyn amber_core::ports::ChunkRepository>,
            tenants.clone() as Arc<dyn amber_core::ports::TenantRepository>,
            embedder as Arc<dyn EmbeddingProvider>,
            Some(settings.default_embedding_model.clone()),
            reranker,
            Some(llm.clone()),
            embedding_cache,
            result_cache,
            degradation,
            EngineConfig::default(),
        );

        let memory = Arc::new(amber_generation::InMemoryMemoryStore::new());
        let generation = GenerationService::new(
            llm,
            memory as Arc<dyn amber_core::ports::MemoryRepository>,
            settings.generation_prompt_token_budget,
            settings.generation_max_user_facts,
            settings.generation_max_recent_summaries,
            Some(settings.default_llm_model.clone()),
        );

        Self {
            settings,
            documents,
            chunks,
            tenants,
            objects,
            kv,
            graph_store,
            vector_store,
            event_bus,
            state_machine,
            usage_log,
            capacity,
            rate_limiter,
            ingestion,
            retrieval,
            generation,
        }
    }

    /// Convenience for ingest-only wiring that does not need a model
    /// known in advance for entity extraction: falls back to the
    /// zero-LLM regex extractor (spec §4.4's fallback path).
    #[must_use]
    pub fn with_regex_extraction(
        settings: Settings,
        llm: Arc<dyn LLMProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        content_extractor: Arc<dyn amber_core::ports::ContentExtractor>,
    ) -> Self {
        Self::new(settings, llm, embedder, None, Arc::new(RegexEntityExtractor::new()), content_extractor)
    }

    /// Builds a standalone provider failover chain sharing this root's
    /// usage log (spec §4.7). Kept separate from `new` because a
    /// failover chain is a list of *alternative* providers, not the
    /// single default `LLMProvider` the rest of the root is wired
    /// against.
    #[must_use]
    pub fn build_provider_chain(&self, providers: Vec<(String, Arc<dyn LLMProvider>)>) -> ProviderOrchestrator {
        ProviderOrchestrator::new(
            providers,
            self.settings.circuit_breaker_failure_threshold,
            Duration::from_secs(self.settings.circuit_breaker_cooldown_seconds),
            self.usage_log.clone(),
        )
    }
}
