//! The retrieval pipeline for one request (spec §4.6). Grounded on
//! `llmspell-context/src/retrieval/hybrid_rag_memory.rs`'s
//! fan-out/fuse/rerank shape, with mode-specific fan-out, RRF fusion,
//! degradation, and beam-search traversal grounded on
//! `examples/original_source/src/core/retrieval/application/search/{fusion,graph_traversal}.py`
//! and `src/core/system/circuit_breaker.py`.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::warn;

use amber_core::error::Result;
use amber_core::ports::{ChunkRepository, EmbeddingProvider, GenerateRequest, LLMProvider, RerankerProvider, TenantRepository, VectorStore};
use amber_core::types::{CachedResult, Tenant};
use amber_graph::InMemoryGraphStore;
use amber_tenancy::{EmbeddingCache, ResultCache};

use crate::degradation::DegradationTracker;
use crate::filters::{parse_filters, QueryFilters};
use crate::fusion::{fuse, Candidate};
use crate::routing::{route, SearchMode};
use crate::traversal::beam_search;

static ENTITY_LIKE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z][a-zA-Z0-9]+(?:\s+[A-Z][a-zA-Z0-9]+)*\b").unwrap());

const FAN_OUT_LIMIT_MULTIPLIER: usize = 4;
const DEFAULT_RRF_K: u32 = 60;
const DEFAULT_BEAM_DEPTH: u32 = 2;
const DEFAULT_BEAM_WIDTH: usize = 5;
const DEFAULT_BEAM_TIMEOUT: Duration = Duration::from_millis(200);

/// Tunables with spec defaults (§4.6); mode weights come from tenant
/// config, these are the knobs the engine itself owns.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub rrf_k: u32,
    pub beam_depth: u32,
    pub beam_width: usize,
    pub beam_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { rrf_k: DEFAULT_RRF_K, beam_depth: DEFAULT_BEAM_DEPTH, beam_width: DEFAULT_BEAM_WIDTH, beam_timeout: DEFAULT_BEAM_TIMEOUT }
    }
}

/// One request's result: the fused/reranked candidates plus the mode
/// actually used (useful for clients debugging routing decisions).
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub mode: SearchMode,
    pub candidates: Vec<Candidate>,
}

#[allow(clippy::too_many_arguments)]
pub struct RetrievalEngine {
    vector_store: Arc<dyn VectorStore>,
    graph_store: Arc<InMemoryGraphStore>,
    chunk_repo: Arc<dyn ChunkRepository>,
    tenants: Arc<dyn TenantRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
    embedding_model: Option<String>,
    reranker: Option<Arc<dyn RerankerProvider>>,
    rewrite_llm: Option<Arc<dyn LLMProvider>>,
    embedding_cache: EmbeddingCache,
    result_cache: ResultCache,
    degradation: DegradationTracker,
    config: EngineConfig,
}

impl RetrievalEngine {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        graph_store: Arc<InMemoryGraphStore>,
        chunk_repo: Arc<dyn ChunkRepository>,
        tenants: Arc<dyn TenantRepository>,
        embedder: Arc<dyn EmbeddingProvider>,
        embedding_model: Option<String>,
        reranker: Option<Arc<dyn RerankerProvider>>,
        rewrite_llm: Option<Arc<dyn LLMProvider>>,
        embedding_cache: EmbeddingCache,
        result_cache: ResultCache,
        degradation: DegradationTracker,
        config: EngineConfig,
    ) -> Self {
        Self {
            vector_store,
            graph_store,
            chunk_repo,
            tenants,
            embedder,
            embedding_model,
            reranker,
            rewrite_llm,
            embedding_cache,
            result_cache,
            degradation,
            config,
        }
    }

    /// Runs the full retrieval pipeline for one request (spec §4.6
    /// steps 1-10).
    pub async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        conversation_history: &[String],
        mode_override: Option<SearchMode>,
        top_k: usize,
    ) -> Result<SearchResult> {
        let started = Instant::now();

        let rewritten = self.contextual_rewrite(query, conversation_history).await;
        let (filters, clean_query) = parse_filters(&rewritten);
        let mode = route(&clean_query, mode_override);

        let tenant = self.tenants.get(tenant_id).await?;
        let last_update_ts = self.tenants.last_update_ts(tenant_id).await?;
        let filters_key = serde_json::to_string(&FilterKey::from(&filters)).unwrap_or_default();

        if let Some(cached) = self.result_cache.get(&clean_query, tenant_id, &filters_key, last_update_ts).await? {
            let candidates = self.resolve_cached(tenant_id, &cached).await?;
            self.record_latency(started);
            return Ok(SearchResult { mode, candidates });
        }

        let degraded = self.degradation.should_degrade();
        let vector = self.embed_query(&clean_query).await?;

        let document_ids = if filters.document_ids.is_empty() { None } else { Some(filters.document_ids.clone()) };
        let fan_out_limit = top_k * FAN_OUT_LIMIT_MULTIPLIER;

        let mut candidates = match mode {
            SearchMode::Basic => self.vector_only(tenant_id, &vector, document_ids.as_deref(), fan_out_limit).await?,
            SearchMode::Hybrid => self.hybrid(tenant_id, &clean_query, &vector, document_ids.as_deref(), fan_out_limit, degraded, &tenant).await?,
            SearchMode::Global => self.global(tenant_id).await,
            SearchMode::Drift => self.drift(tenant_id, &vector, document_ids.as_deref(), fan_out_limit, degraded, &tenant).await?,
        };

        candidates.truncate(fan_out_limit);

        if !degraded {
            if let Some(reranker) = &self.reranker {
                candidates = self.rerank(reranker.as_ref(), &clean_query, candidates, top_k).await;
            }
        }
        candidates.truncate(top_k);

        self.fill_missing_content(tenant_id, &mut candidates).await?;

        let cached_result = CachedResult::new(
            tenant_id,
            candidates.iter().map(|c| c.chunk_id.clone()).collect(),
            candidates.iter().map(|c| c.score).collect(),
        );
        if let Err(err) = self.result_cache.set(&clean_query, &filters_key, &cached_result).await {
            warn!(tenant_id, error = %err, "failed to persist result cache entry");
        }

        self.record_latency(started);
        Ok(SearchResult { mode, candidates })
    }

    fn record_latency(&self, started: Instant) {
        let latency_ms = started.elapsed().as_millis() as u64;
        self.degradation.record_latency(latency_ms);
    }

    async fn contextual_rewrite(&self, query: &str, conversation_history: &[String]) -> String {
        let Some(llm) = &self.rewrite_llm else {
            return query.to_string();
        };
        if conversation_history.is_empty() {
            return query.to_string();
        }

        let prompt = format!(
            "Given this recent conversation:\n{}\n\nRewrite the following follow-up query to be self-contained. \
             Respond with only the rewritten query.\n\nQuery: {query}",
            conversation_history.join("\n")
        );

        match llm.generate(GenerateRequest { prompt, temperature: 0.0, max_tokens: Some(200), ..Default::default() }).await {
            Ok(response) => response.text.trim().to_string(),
            Err(err) => {
                warn!(error = %err, "contextual query rewrite failed, using the original query");
                query.to_string()
            }
        }
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        if let Some(vector) = self.embedding_cache.get(query).await? {
            return Ok(vector);
        }

        let response = self.embedder.embed(&[query.to_string()], self.embedding_model.as_deref(), None).await?;
        let vector = response.embeddings.into_iter().next().unwrap_or_default();
        if let Err(err) = self.embedding_cache.set(query, &vector).await {
            warn!(error = %err, "failed to persist embedding cache entry");
        }
        Ok(vector)
    }

    async fn vector_only(&self, tenant_id: &str, vector: &[f32], document_ids: Option<&[String]>, limit: usize) -> Result<Vec<Candidate>> {
        let hits = self.vector_store.search(tenant_id, vector, document_ids, limit, None).await?;
        Ok(hits.into_iter().map(|hit| Candidate { chunk_id: hit.chunk_id, document_id: hit.document_id, content: hit.content, score: hit.score, source: "vector".to_string() }).collect())
    }

    async fn hybrid(
        &self,
        tenant_id: &str,
        query_text: &str,
        vector: &[f32],
        document_ids: Option<&[String]>,
        limit: usize,
        degraded: bool,
        tenant: &Option<Tenant>,
    ) -> Result<Vec<Candidate>> {
        let vector_candidates = self.vector_only(tenant_id, vector, document_ids, limit).await?;

        let mut groups = HashMap::new();
        groups.insert("vector".to_string(), vector_candidates);

        if !degraded {
            let seeds = self.seed_entities(tenant_id, query_text);
            let graph_candidates = beam_search(&self.graph_store, tenant_id, &seeds, self.config.beam_depth, self.config.beam_width, self.config.beam_timeout);
            groups.insert("graph".to_string(), graph_candidates);
        }

        Ok(fuse(&groups, self.config.rrf_k, &mode_weights(tenant)))
    }

    /// Iterative exploration seeded by a local (vector) search: the
    /// entities mentioned by the top hits reseed one more beam-search
    /// hop. Falls back to the plain vector results when nothing new
    /// is reached (spec §4.6: "falling back to basic").
    async fn drift(
        &self,
        tenant_id: &str,
        vector: &[f32],
        document_ids: Option<&[String]>,
        limit: usize,
        degraded: bool,
        tenant: &Option<Tenant>,
    ) -> Result<Vec<Candidate>> {
        let local = self.vector_only(tenant_id, vector, document_ids, limit).await?;
        if degraded {
            return Ok(local);
        }

        let seed_chunk_ids: Vec<String> = local.iter().take(self.config.beam_width).map(|c| c.chunk_id.clone()).collect();
        let seeds = self.graph_store.entities_mentioned_by(tenant_id, &seed_chunk_ids);
        if seeds.is_empty() {
            return Ok(local);
        }

        let explored = beam_search(&self.graph_store, tenant_id, &seeds, self.config.beam_depth, self.config.beam_width, self.config.beam_timeout);

        let mut groups = HashMap::new();
        groups.insert("vector".to_string(), local);
        groups.insert("graph".to_string(), explored);
        Ok(fuse(&groups, self.config.rrf_k, &mode_weights(tenant)))
    }

    /// Community-summary synthesis over the whole tenant graph: one
    /// pseudo-candidate per community, its `content` carrying the
    /// community's summary (spec §4.6: "community-summary LLM
    /// synthesis over the whole tenant graph" — the synthesis itself
    /// runs during `amber_graph::recompute_stale`; this surfaces the
    /// precomputed summaries as retrievable candidates).
    async fn global(&self, tenant_id: &str) -> Vec<Candidate> {
        self.graph_store
            .communities(tenant_id)
            .into_iter()
            .map(|community| Candidate {
                chunk_id: format!("community:{}", community.id),
                document_id: String::new(),
                content: community.summary,
                score: community.rating.unwrap_or(0.5),
                source: "global".to_string(),
            })
            .collect()
    }

    fn seed_entities(&self, tenant_id: &str, query_text: &str) -> Vec<String> {
        let mentioned: std::collections::HashSet<String> = ENTITY_LIKE_PATTERN.find_iter(query_text).map(|m| m.as_str().to_string()).collect();
        if mentioned.is_empty() {
            return Vec::new();
        }
        self.graph_store.entities(tenant_id).into_iter().map(|e| e.name).filter(|name| mentioned.contains(name)).collect()
    }

    async fn rerank(&self, reranker: &dyn RerankerProvider, query: &str, candidates: Vec<Candidate>, top_k: usize) -> Vec<Candidate> {
        if candidates.is_empty() {
            return candidates;
        }
        let docs: Vec<String> = candidates.iter().map(|c| c.content.clone()).collect();

        match reranker.rerank(query, &docs, None, Some(top_k.max(candidates.len()))).await {
            Ok(hits) => hits
                .into_iter()
                .filter_map(|hit| candidates.get(hit.index).cloned().map(|mut c| {
                    c.score = hit.score;
                    c
                }))
                .collect(),
            Err(err) => {
                warn!(error = %err, "reranker call failed, keeping fused order");
                candidates
            }
        }
    }

    /// For any candidate whose `content` is empty (a cache-resolved
    /// hit, or a fan-out source that doesn't carry content), fetch it
    /// from the chunk repository by id (spec §4.6 step 9).
    async fn fill_missing_content(&self, tenant_id: &str, candidates: &mut [Candidate]) -> Result<()> {
        let missing_ids: Vec<String> = candidates.iter().filter(|c| c.content.is_empty() && !c.chunk_id.starts_with("community:")).map(|c| c.chunk_id.clone()).collect();
        if missing_ids.is_empty() {
            return Ok(());
        }

        let chunks = self.chunk_repo.get_by_ids(tenant_id, &missing_ids).await?;
        let by_id: HashMap<&str, &str> = chunks.iter().map(|c| (c.id.as_str(), c.content.as_str())).collect();

        for candidate in candidates.iter_mut() {
            if candidate.content.is_empty() {
                if let Some(content) = by_id.get(candidate.chunk_id.as_str()) {
                    candidate.content = (*content).to_string();
                }
            }
        }
        Ok(())
    }

    async fn resolve_cached(&self, tenant_id: &str, cached: &CachedResult) -> Result<Vec<Candidate>> {
        let chunks = self.chunk_repo.get_by_ids(tenant_id, &cached.chunk_ids).await?;
        let by_id: HashMap<&str, &amber_core::types::Chunk> = chunks.iter().map(|c| (c.id.as_str(), c)).collect();

        Ok(cached
            .chunk_ids
            .iter()
            .zip(cached.scores.iter())
            .filter_map(|(chunk_id, score)| {
                by_id.get(chunk_id.as_str()).map(|chunk| Candidate {
                    chunk_id: chunk_id.clone(),
                    document_id: chunk.document_id.clone(),
                    content: chunk.content.clone(),
                    score: *score,
                    source: "cache".to_string(),
                })
            })
            .collect())
    }
}

#[derive(serde::Serialize)]
struct FilterKey {
    tags: Vec<String>,
    document_ids: Vec<String>,
    date_from: Option<chrono::DateTime<chrono::Utc>>,
    date_to: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&QueryFilters> for FilterKey {
    fn from(filters: &QueryFilters) -> Self {
        Self { tags: filters.tags.clone(), document_ids: filters.document_ids.clone(), date_from: filters.date_from, date_to: filters.date_to }
    }
}

fn mode_weights(tenant: &Option<Tenant>) -> HashMap<String, f32> {
    let mut weights = HashMap::new();
    weights.insert("vector".to_string(), 1.0);
    weights.insert("graph".to_string(), 1.0);

    let Some(tenant) = tenant else {
        return weights;
    };
    if let Some(value) = tenant.config.get("vector_weight").and_then(serde_json::Value::as_f64) {
        weights.insert("vector".to_string(), value as f32);
    }
    if let Some(value) = tenant.config.get("graph_weight").and_then(serde_json::Value::as_f64) {
        weights.insert("graph".to_string(), value as f32);
    }
    weights
}
