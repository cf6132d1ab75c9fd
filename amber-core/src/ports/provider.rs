//! LLM / embedding / reranker provider ports (spec §4.7, §6).

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Token usage reported by a provider call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    pub tokens_in: u32,
    pub tokens_out: u32,
}

/// A chat-style message for providers that support multi-turn `chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Parameters shared by `generate` and `generate_stream`.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub text: String,
    pub model: String,
    pub provider: String,
    pub usage: Usage,
    pub finish_reason: String,
    pub latency_ms: u64,
    pub cost_estimate: f64,
}

/// An incremental token (or the end marker) from a streaming generation.
#[derive(Debug, Clone)]
pub enum GenerateStreamEvent {
    Token(String),
    Done(GenerateResponse),
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> Result<BoxStream<'static, Result<GenerateStreamEvent>>>;

    async fn chat(&self, messages: &[ChatMessage], model: Option<&str>) -> Result<GenerateResponse> {
        let prompt = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        self.generate(GenerateRequest {
            prompt,
            model: model.map(str::to_string),
            ..Default::default()
        })
        .await
    }
}

#[derive(Debug, Clone)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    pub dimensions: usize,
    pub usage: Usage,
    pub cost_estimate: f64,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, texts: &[String], model: Option<&str>, dimensions: Option<usize>) -> Result<EmbedResponse>;

    /// Sparse (token-id -> weight) companion to `embed`, best-effort
    /// (spec §4.2 step 5). `Ok(None)` means this provider has no
    /// sparse model to offer; the default implementation says exactly
    /// that, so adapters only override it when they actually have one.
    async fn embed_sparse(&self, _texts: &[String], _model: Option<&str>) -> Result<Option<Vec<std::collections::HashMap<u32, f32>>>> {
        Ok(None)
    }
}

#[derive(Debug, Clone)]
pub struct RerankHit {
    pub index: usize,
    pub score: f32,
    pub text: Option<String>,
}

#[async_trait]
pub trait RerankerProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn rerank(&self, query: &str, docs: &[String], model: Option<&str>, top_k: Option<usize>) -> Result<Vec<RerankHit>>;
}
