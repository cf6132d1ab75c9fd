//! Generation orchestration (spec §4.12, C12): assembles the prompt,
//! calls the LLM in streaming mode, and persists a scrubbed summary of
//! the exchange into conversation memory.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tracing::warn;

use amber_core::error::Result;
use amber_core::ports::{GenerateRequest, GenerateStreamEvent, LLMProvider, MemoryRepository};
use amber_core::types::ConversationSummary;

use crate::assembly::{CitedChunk, PromptAssembler};
use crate::pii::scrub_pii;
use crate::streaming::GenerationEvent;

pub struct GenerationService {
    llm: Arc<dyn LLMProvider>,
    memory: Arc<dyn MemoryRepository>,
    assembler: PromptAssembler,
    model: Option<String>,
    max_user_facts: usize,
    max_recent_summaries: usize,
}

impl GenerationService {
    #[must_use]
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        memory: Arc<dyn MemoryRepository>,
        prompt_token_budget: usize,
        max_user_facts: usize,
        max_recent_summaries: usize,
        model: Option<String>,
    ) -> Self {
        Self { llm, memory, assembler: PromptAssembler::new(prompt_token_budget), model, max_user_facts, max_recent_summaries }
    }

    /// Assembles the prompt, starts a streaming generation, and
    /// returns a stream of `sources` -> `token`* -> `done` events
    /// (spec §4.12). The final answer and the original query are
    /// PII-scrubbed before the exchange is persisted as a
    /// conversation summary.
    pub async fn generate(
        &self,
        tenant_id: &str,
        user_id: &str,
        conversation_id: &str,
        system_rules: &str,
        query: &str,
        chunks: Vec<CitedChunk>,
    ) -> Result<BoxStream<'static, Result<GenerationEvent>>> {
        let scrubbed_query = scrub_pii(query);

        let user_facts = self.memory.get_user_facts(tenant_id, user_id, self.max_user_facts).await?;
        let recent_summaries = self.memory.get_recent_summaries(tenant_id, user_id, self.max_recent_summaries).await?;

        let assembled = self.assembler.assemble(system_rules, &user_facts, &recent_summaries, chunks, &scrubbed_query);

        let request = GenerateRequest { prompt: assembled.text.clone(), model: self.model.clone(), ..Default::default() };
        let inner = self.llm.generate_stream(request).await?;

        let sources_event = stream::once(async move { Ok(GenerationEvent::Sources(assembled.citations)) });

        let memory = self.memory.clone();
        let tenant_id = tenant_id.to_string();
        let user_id = user_id.to_string();
        let conversation_id = conversation_id.to_string();
        let collected = Arc::new(Mutex::new(String::new()));

        let token_events = inner.then(move |event| {
            let memory = memory.clone();
            let tenant_id = tenant_id.clone();
            let user_id = user_id.clone();
            let conversation_id = conversation_id.clone();
            let query_for_summary = scrubbed_query.clone();
            let collected = collected.clone();

            async move {
                match event? {
                    GenerateStreamEvent::Token(token) => {
                        collected.lock().push_str(&token);
                        Ok(GenerationEvent::Token(token))
                    }
                    GenerateStreamEvent::Done(response) => {
                        let final_text = scrub_pii(&response.text);
                        let follow_ups = Self::suggest_follow_ups(&final_text);

                        let summary = ConversationSummary {
                            conversation_id,
                            tenant_id,
                            user_id,
                            summary: format!("Q: {query_for_summary}\nA: {final_text}"),
                            message_count: 1,
                            updated_at: chrono::Utc::now(),
                        };
                        if let Err(err) = memory.save_conversation_summary(&summary).await {
                            warn!(error = %err, "failed to persist conversation summary");
                        }

                        Ok(GenerationEvent::Done { text: final_text, follow_ups })
                    }
                }
            }
        });

        Ok(Box::pin(sources_event.chain(token_events)))
    }

    /// Minimal heuristic follow-up suggestion: asks whether the user
    /// wants elaboration when the answer looks truncated or uncertain.
    /// No dedicated follow-up model exists in this reference adapter.
    fn suggest_follow_ups(final_text: &str) -> Vec<String> {
        if final_text.trim().is_empty() {
            return Vec::new();
        }
        if final_text.to_lowercase().contains("does not contain") || final_text.to_lowercase().contains("don't know") {
            return vec!["Would you like me to search a broader set of documents?".to_string()];
        }
        vec!["Would you like more detail on any part of this answer?".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_core::ports::{GenerateResponse, Usage};
    use amber_core::types::UserFact;
    use async_trait::async_trait;
    use futures::stream::BoxStream as FBoxStream;

    struct StubLlm;

    #[async_trait]
    impl LLMProvider for StubLlm {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
            Ok(GenerateResponse {
                text: "Refunds take 5 days.".to_string(),
                model: "stub".to_string(),
                provider: "stub".to_string(),
                usage: Usage::default(),
                finish_reason: "stop".to_string(),
                latency_ms: 1,
                cost_estimate: 0.0,
            })
        }

        async fn generate_stream(&self, _request: GenerateRequest) -> Result<FBoxStream<'static, Result<GenerateStreamEvent>>> {
            let response = self.generate(GenerateRequest::default()).await?;
            let events = vec![
                Ok(GenerateStreamEvent::Token("Refunds ".to_string())),
                Ok(GenerateStreamEvent::Token("take 5 days.".to_string())),
                Ok(GenerateStreamEvent::Done(response)),
            ];
            Ok(Box::pin(stream::iter(events)))
        }
    }

    struct StubMemory {
        saved: Mutex<Vec<ConversationSummary>>,
    }

    #[async_trait]
    impl MemoryRepository for StubMemory {
        async fn add_user_fact(&self, _fact: &UserFact) -> Result<()> {
            Ok(())
        }
        async fn get_user_facts(&self, _tenant_id: &str, _user_id: &str, _limit: usize) -> Result<Vec<UserFact>> {
            Ok(Vec::new())
        }
        async fn delete_user_fact(&self, _tenant_id: &str, _fact_id: &str) -> Result<bool> {
            Ok(false)
        }
        async fn save_conversation_summary(&self, summary: &ConversationSummary) -> Result<()> {
            self.saved.lock().push(summary.clone());
            Ok(())
        }
        async fn get_recent_summaries(&self, _tenant_id: &str, _user_id: &str, _limit: usize) -> Result<Vec<ConversationSummary>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn streams_sources_then_tokens_then_done() {
        let memory = Arc::new(StubMemory { saved: Mutex::new(Vec::new()) });
        let service = GenerationService::new(Arc::new(StubLlm), memory.clone(), 8000, 20, 5, None);

        let chunks = vec![CitedChunk { index: 0, document_id: "d1".to_string(), content: "refunds take 5 days".to_string() }];
        let mut stream = service.generate("t1", "u1", "c1", "Be helpful.", "what is the refund window?", chunks).await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert!(matches!(first, GenerationEvent::Sources(_)));

        let mut saw_token = false;
        let mut done_text = None;
        while let Some(event) = stream.next().await {
            match event.unwrap() {
                GenerationEvent::Token(_) => saw_token = true,
                GenerationEvent::Done { text, .. } => done_text = Some(text),
                GenerationEvent::Sources(_) => unreachable!(),
            }
        }

        assert!(saw_token);
        assert_eq!(done_text.unwrap(), "Refunds take 5 days.");
        assert_eq!(memory.saved.lock().len(), 1);
    }

    #[tokio::test]
    async fn scrubs_pii_from_the_persisted_summary() {
        struct PiiLlm;

        #[async_trait]
        impl LLMProvider for PiiLlm {
            fn name(&self) -> &str {
                "pii"
            }
            async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
                Ok(GenerateResponse {
                    text: "contact jane@example.com for more".to_string(),
                    model: "pii".to_string(),
                    provider: "pii".to_string(),
                    usage: Usage::default(),
                    finish_reason: "stop".to_string(),
                    latency_ms: 1,
                    cost_estimate: 0.0,
                })
            }
            async fn generate_stream(&self, _request: GenerateRequest) -> Result<FBoxStream<'static, Result<GenerateStreamEvent>>> {
                let response = self.generate(GenerateRequest::default()).await?;
                Ok(Box::pin(stream::iter(vec![Ok(GenerateStreamEvent::Done(response))])))
            }
        }

        let memory = Arc::new(StubMemory { saved: Mutex::new(Vec::new()) });
        let service = GenerationService::new(Arc::new(PiiLlm), memory.clone(), 8000, 20, 5, None);
        let mut stream = service.generate("t1", "u1", "c1", "rules", "query", vec![]).await.unwrap();

        while stream.next().await.is_some() {}

        let saved = memory.saved.lock();
        assert!(!saved[0].summary.contains("jane@example.com"));
        assert!(saved[0].summary.contains("[REDACTED_EMAIL]"));
    }
}
