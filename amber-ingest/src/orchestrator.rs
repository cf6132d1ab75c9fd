//! Register/process ingestion pipeline (spec §4.2).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use amber_config::Settings;
use amber_core::error::{AmberError, Result};
use amber_core::ports::{
    ChunkRepository, ContentExtractor, DocumentRepository, GenerateRequest, LLMProvider, ObjectStorage, TenantRepository,
    VectorStore,
};
use amber_core::types::{Chunk, Document, DocumentStatus, EmbeddingStatus, SparseEmbeddingOutcome};
use amber_events::state_machine::DocumentStateMachine;
use amber_graph::{GraphBuildConfig, GraphBuilder};
use amber_providers::UsageLog;

use crate::chunking::{config_for_domain, ChunkingStrategy, SlidingWindowChunker};
use crate::classification::DomainClassifier;
use crate::embedding::Embedder;

/// How many chunks' Graph Builder calls run concurrently (spec §4.2
/// step 7: "concurrency ≤ 5").
const GRAPH_BUILD_CONCURRENCY: usize = 5;
/// How many leading chunks feed document-level enrichment (spec §4.2 step 8).
const ENRICHMENT_CHUNK_COUNT: usize = 10;

pub struct IngestionOrchestrator {
    documents: Arc<dyn DocumentRepository>,
    chunk_repo: Arc<dyn ChunkRepository>,
    tenants: Arc<dyn TenantRepository>,
    objects: Arc<dyn ObjectStorage>,
    extractor: Arc<dyn ContentExtractor>,
    classifier: DomainClassifier,
    embedder: Embedder,
    embedding_model: String,
    vector_store: Arc<dyn VectorStore>,
    graph_builder: Arc<dyn GraphBuilder>,
    enrichment_llm: Arc<dyn LLMProvider>,
    enrichment_model: String,
    chunker: Box<dyn ChunkingStrategy>,
    state_machine: Arc<DocumentStateMachine>,
    usage_log: Arc<UsageLog>,
}

impl IngestionOrchestrator {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        chunk_repo: Arc<dyn ChunkRepository>,
        tenants: Arc<dyn TenantRepository>,
        objects: Arc<dyn ObjectStorage>,
        extractor: Arc<dyn ContentExtractor>,
        llm: Arc<dyn LLMProvider>,
        embedder: Embedder,
        vector_store: Arc<dyn VectorStore>,
        graph_builder: Arc<dyn GraphBuilder>,
        state_machine: Arc<DocumentStateMachine>,
        usage_log: Arc<UsageLog>,
        settings: &Settings,
    ) -> Self {
        Self {
            documents,
            chunk_repo,
            tenants,
            objects,
            extractor,
            classifier: DomainClassifier::new(llm.clone(), Some(settings.default_llm_model.clone())),
            embedder,
            embedding_model: settings.default_embedding_model.clone(),
            vector_store,
            graph_builder,
            enrichment_llm: llm,
            enrichment_model: settings.default_llm_model.clone(),
            chunker: Box::new(SlidingWindowChunker::new()),
            state_machine,
            usage_log,
        }
    }

    /// Register an uploaded file. Idempotent: a repeat upload of bytes
    /// already known under `(tenant_id, content_hash)` returns the
    /// existing document untouched (spec §4.2 "Register").
    pub async fn register(&self, tenant_id: &str, filename: &str, bytes: Vec<u8>, content_type: &str) -> Result<Document> {
        let content_hash = Document::hash_bytes(&bytes);

        if let Some(existing) = self.documents.find_by_content_hash(tenant_id, &content_hash).await? {
            debug!(tenant_id, content_hash = %content_hash, "document already registered, skipping re-ingest");
            return Ok(existing);
        }

        let document_id = Uuid::new_v4().to_string();
        let storage_path = Document::storage_path_for(tenant_id, &document_id, filename);
        self.objects.upload(&storage_path, bytes, content_type).await?;

        let document = Document {
            id: document_id,
            tenant_id: tenant_id.to_string(),
            filename: filename.to_string(),
            content_hash,
            storage_path,
            status: DocumentStatus::Ingested,
            domain: None,
            summary: None,
            document_type: None,
            keywords: Vec::new(),
            hashtags: Vec::new(),
            metadata: HashMap::new(),
            error_message: None,
            created_at: chrono::Utc::now(),
        };
        self.documents.save(&document).await?;
        info!(document_id = %document.id, tenant_id, "document registered");

        Ok(document)
    }

    /// Drive a registered document through the full pipeline. Any
    /// unrecovered error before `READY` transitions the document to
    /// `FAILED` with a short message (spec §4.2 "Failure policy").
    pub async fn process(&self, tenant_id: &str, document_id: &str) -> Result<()> {
        match self.try_process(tenant_id, document_id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(tenant_id, document_id, error = %err, "ingestion failed, marking document FAILED");
                let current_status = self
                    .documents
                    .get(tenant_id, document_id)
                    .await
                    .ok()
                    .flatten()
                    .map_or(DocumentStatus::Ingested, |d| d.status);
                self.state_machine.fail(tenant_id, document_id, current_status, &err.to_string()).await?;
                Err(err)
            }
        }
    }

    async fn try_process(&self, tenant_id: &str, document_id: &str) -> Result<()> {
        if !self
            .state_machine
            .advance(tenant_id, document_id, DocumentStatus::Ingested, DocumentStatus::Extracting)
            .await?
        {
            debug!(tenant_id, document_id, "lost CAS race to another worker, aborting");
            return Ok(());
        }

        let mut document = self
            .documents
            .get(tenant_id, document_id)
            .await?
            .ok_or_else(|| AmberError::not_found(format!("document {document_id} vanished mid-pipeline")))?;

        let bytes = self.objects.get_bytes(&document.storage_path).await?;
        let mime_type = guess_mime_type(&document.filename);
        let extracted = self.extractor.extract(&bytes, &mime_type, &document.filename).await?;
        debug!(document_id, extractor = %extracted.extractor_used, confidence = extracted.confidence, "content extracted");

        self.state_machine
            .advance(tenant_id, document_id, DocumentStatus::Extracting, DocumentStatus::Classifying)
            .await?;
        let domain = self.classifier.classify(&extracted.content).await?;
        document.domain = Some(domain.clone());
        self.documents.save(&document).await?;

        self.state_machine
            .advance(tenant_id, document_id, DocumentStatus::Classifying, DocumentStatus::Chunking)
            .await?;
        let chunking_config = config_for_domain(Some(&domain));
        let chunked = self.chunker.chunk(&extracted.content, &chunking_config).await?;
        let chunks: Vec<Chunk> = chunked
            .iter()
            .map(|c| Chunk::new(tenant_id, document_id, c.index, c.content.clone(), c.token_count))
            .collect();
        self.chunk_repo.insert_batch(&chunks).await?;
        info!(document_id, chunk_count = chunks.len(), "document chunked");

        self.state_machine
            .advance(tenant_id, document_id, DocumentStatus::Chunking, DocumentStatus::Embedding)
            .await?;
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let tenant = self.tenants.get(tenant_id).await?;
        let embedding_model = tenant
            .as_ref()
            .and_then(|t| t.config.get("embedding_model"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.embedding_model.clone());

        let vectors = match self.embedder.embed_texts(&texts, Some(&embedding_model), None).await {
            Ok(vectors) => vectors,
            Err(err) => {
                self.mark_chunks(&chunks, EmbeddingStatus::Failed).await?;
                return Err(err);
            }
        };
        self.vector_store.upsert(tenant_id, &chunks, &vectors).await?;
        self.mark_chunks(&chunks, EmbeddingStatus::Completed).await?;

        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let sparse_outcomes = self.embedder.embed_sparse_best_effort(&texts, &chunk_ids, Some(&embedding_model)).await;
        let sparse_produced = sparse_outcomes.iter().filter(|o| matches!(o, SparseEmbeddingOutcome::Produced(_))).count();
        debug!(document_id, sparse_produced, sparse_total = sparse_outcomes.len(), "sparse embedding pass complete");

        let graph_config = GraphBuildConfig::default();
        self.graph_builder
            .sync_chunks(tenant_id, document_id, &document.filename, &chunks, &vectors, &graph_config)
            .await?;

        self.state_machine
            .advance(tenant_id, document_id, DocumentStatus::Embedding, DocumentStatus::GraphSync)
            .await?;
        self.build_graph_for_chunks(tenant_id, document_id, &chunks).await;

        if let Err(err) = self.enrich_document(&mut document, &chunks).await {
            warn!(document_id, error = %err, "document enrichment failed, continuing best-effort");
        }
        self.documents.save(&document).await?;

        self.state_machine
            .advance(tenant_id, document_id, DocumentStatus::GraphSync, DocumentStatus::Ready)
            .await?;
        info!(document_id, tenant_id, "document ready");

        Ok(())
    }

    async fn mark_chunks(&self, chunks: &[Chunk], status: EmbeddingStatus) -> Result<()> {
        let updated: Vec<Chunk> = chunks
            .iter()
            .cloned()
            .map(|mut c| {
                c.embedding_status = status;
                c
            })
            .collect();
        self.chunk_repo.insert_batch(&updated).await
    }

    /// Invokes the Graph Builder per chunk with bounded concurrency.
    /// Per-chunk failures are logged and otherwise ignored: graph sync
    /// is enrichment, not a pipeline-blocking dependency (spec §4.2
    /// step 7: "Graph failures are logged but do not fail the document").
    async fn build_graph_for_chunks(&self, tenant_id: &str, document_id: &str, chunks: &[Chunk]) {
        let semaphore = Arc::new(Semaphore::new(GRAPH_BUILD_CONCURRENCY));
        let mut tasks = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let permit = semaphore.clone();
            let builder = self.graph_builder.clone();
            let tenant_id = tenant_id.to_string();
            let document_id = document_id.to_string();
            let chunk = chunk.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                builder.build_for_chunk(&tenant_id, &document_id, &chunk).await
            }));
        }

        for task in tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(document_id, error = %err, "graph builder failed for chunk, continuing"),
                Err(join_err) => warn!(document_id, error = %join_err, "graph builder task panicked, continuing"),
            }
        }
    }

    /// Best-effort document-level enrichment from the first 10 chunks
    /// (spec §4.2 step 8).
    async fn enrich_document(&self, document: &mut Document, chunks: &[Chunk]) -> Result<()> {
        let sample: String = chunks
            .iter()
            .take(ENRICHMENT_CHUNK_COUNT)
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "Given the following document excerpt, respond with a single JSON object \
             with keys \"summary\" (one paragraph), \"document_type\" (short label), \
             \"hashtags\" (array of short tags), and \"keywords\" (array of keywords). \
             Respond with only the JSON object.\n\n{sample}"
        );

        let response = self
            .enrichment_llm
            .generate(GenerateRequest {
                prompt,
                model: Some(self.enrichment_model.clone()),
                temperature: 0.0,
                max_tokens: Some(512),
                ..Default::default()
            })
            .await?;

        self.usage_log.record(
            &document.tenant_id,
            "ingest.enrich",
            &response.provider,
            &response.model,
            response.usage,
            response.cost_estimate,
            &Uuid::new_v4().to_string(),
            None,
            HashMap::from([("document_id".to_string(), serde_json::Value::String(document.id.clone()))]),
        );

        let cleaned = strip_markdown_fence(&response.text);
        let parsed: serde_json::Value = serde_json::from_str(cleaned)
            .map_err(|e| AmberError::internal(format!("enrichment response was not valid JSON: {e}")))?;

        document.summary = parsed.get("summary").and_then(|v| v.as_str()).map(str::to_string);
        document.document_type = parsed.get("document_type").and_then(|v| v.as_str()).map(str::to_string);
        document.hashtags = parsed
            .get("hashtags")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        document.keywords = parsed
            .get("keywords")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        Ok(())
    }
}

fn strip_markdown_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed)
        .strip_suffix("```")
        .unwrap_or(trimmed)
        .trim()
}

fn guess_mime_type(filename: &str) -> String {
    match filename.rsplit('.').next().unwrap_or("").to_lowercase().as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
    .to_string()
}
