//! Tenant config cache, weight tuning, and feedback analysis (C11, spec
//! §4.11). Grounded on `examples/original_source/src/core/services/tuning.py`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use amber_core::error::Result;
use amber_core::ports::{GenerateRequest, LLMProvider, TenantRepository};
use amber_core::types::Tenant;

const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// A single append-only audit log entry (spec §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub tenant_id: String,
    pub actor: String,
    pub action: String,
    pub target: String,
    pub changes: Value,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// Retrieval-failure classification for negative feedback (spec §4.11,
/// supplemented from `tuning.py`'s `analyze_feedback_for_tuning`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackCause {
    RetrievalFailure,
    Hallucination,
    Other,
}

/// Persisted outcome of a feedback analysis, including the unapplied
/// suggested weight delta (spec §4.11: "log a suggested weight
/// adjustment (do not auto-apply)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackAnalysis {
    pub tenant_id: String,
    pub request_id: String,
    pub cause: FeedbackCause,
    pub confidence: f32,
    pub explanation: String,
    pub suggested_weight_adjustment: Option<(String, f32)>,
}

/// Fixed-capacity, manually-evicted LRU: `llmspell`'s workspace has no
/// LRU crate dependency for this scale, so eviction is implemented
/// directly over a `HashMap` + recency queue rather than adding one.
struct LruCache<K: Eq + std::hash::Hash + Clone, V: Clone> {
    capacity: usize,
    entries: HashMap<K, V>,
    recency: VecDeque<K>,
}

impl<K: Eq + std::hash::Hash + Clone, V: Clone> LruCache<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        if let Some(value) = self.entries.get(key).cloned() {
            self.recency.retain(|k| k != key);
            self.recency.push_back(key.clone());
            Some(value)
        } else {
            None
        }
    }

    fn insert(&mut self, key: K, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self.recency.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.recency.retain(|k| k != &key);
        self.recency.push_back(key.clone());
        self.entries.insert(key, value);
    }

    fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
        self.recency.retain(|k| k != key);
    }
}

/// `getTenantConfig` cache + weight tuning + audit log (spec §4.11).
pub struct TenantConfigStore {
    repository: Arc<dyn TenantRepository>,
    cache: Mutex<LruCache<String, Tenant>>,
    audit_log: Mutex<Vec<AuditLogEntry>>,
}

impl TenantConfigStore {
    #[must_use]
    pub fn new(repository: Arc<dyn TenantRepository>) -> Self {
        Self {
            repository,
            cache: Mutex::new(LruCache::new(DEFAULT_CACHE_CAPACITY)),
            audit_log: Mutex::new(Vec::new()),
        }
    }

    pub async fn get_tenant_config(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        if let Some(tenant) = self.cache.lock().get(&tenant_id.to_string()) {
            return Ok(Some(tenant));
        }
        let tenant = self.repository.get(tenant_id).await?;
        if let Some(ref tenant) = tenant {
            self.cache.lock().insert(tenant_id.to_string(), tenant.clone());
        }
        Ok(tenant)
    }

    /// Rewrite `<name>_weight` keys in the tenant's config. Invalidates
    /// the cache entry and appends an audit log row (spec §4.11).
    pub async fn update_tenant_weights(
        &self,
        tenant_id: &str,
        actor: &str,
        weights: HashMap<String, f32>,
    ) -> Result<Tenant> {
        let patch: HashMap<String, Value> = weights
            .iter()
            .map(|(name, value)| (format!("{name}_weight"), serde_json::json!(value)))
            .collect();

        let updated = self.repository.update_config(tenant_id, patch).await?;
        self.cache.lock().invalidate(&tenant_id.to_string());

        self.audit_log.lock().push(AuditLogEntry {
            tenant_id: tenant_id.to_string(),
            actor: actor.to_string(),
            action: "update_weights".to_string(),
            target: tenant_id.to_string(),
            changes: serde_json::json!({ "weights": weights }),
            recorded_at: chrono::Utc::now(),
        });

        Ok(updated)
    }

    #[must_use]
    pub fn audit_log(&self) -> Vec<AuditLogEntry> {
        self.audit_log.lock().clone()
    }

    /// Classify negative feedback into a tuning cause via an LLM call.
    /// Positive feedback and feedback with no detail are skipped
    /// without invoking the model (spec §4.11).
    pub async fn analyze_feedback_for_tuning(
        &self,
        llm: &dyn LLMProvider,
        tenant_id: &str,
        request_id: &str,
        positive: bool,
        comment: Option<&str>,
        snippets: &[String],
    ) -> Option<FeedbackAnalysis> {
        if positive {
            return None;
        }
        if comment.is_none() && snippets.is_empty() {
            info!(tenant_id, request_id, "no detailed feedback, skipping tuning analysis");
            return None;
        }

        let snippets_text = if snippets.is_empty() {
            "None".to_string()
        } else {
            snippets.iter().map(|s| format!("- {s}")).collect::<Vec<_>>().join("\n")
        };

        let prompt = format!(
            "A user gave negative feedback on a generated answer.\n\
             User comment: \"{}\"\n\
             Flagged snippets:\n{snippets_text}\n\n\
             Classify the cause as RETRIEVAL_FAILURE, HALLUCINATION, or OTHER.\n\
             Return JSON only: {{\"reason\": string, \"confidence\": number, \"explanation\": string}}",
            comment.unwrap_or("No comment"),
        );

        let response = match llm
            .generate(GenerateRequest {
                prompt,
                ..Default::default()
            })
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, tenant_id, request_id, "feedback analysis llm call failed");
                return None;
            }
        };

        let cleaned = response.text.replace("```json", "").replace("```", "");
        let parsed: Value = match serde_json::from_str(cleaned.trim()) {
            Ok(value) => value,
            Err(_) => {
                warn!(tenant_id, request_id, "failed to parse feedback analysis response");
                return None;
            }
        };

        let cause = match parsed.get("reason").and_then(Value::as_str) {
            Some("RETRIEVAL_FAILURE") => FeedbackCause::RetrievalFailure,
            Some("HALLUCINATION") => FeedbackCause::Hallucination,
            _ => FeedbackCause::Other,
        };
        let confidence = parsed.get("confidence").and_then(Value::as_f64).unwrap_or(0.0) as f32;
        let explanation = parsed
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let suggested_weight_adjustment = if cause == FeedbackCause::RetrievalFailure && confidence > 0.7 {
            info!(tenant_id, request_id, "suggesting graph_weight increase after retrieval failure");
            Some(("graph_weight".to_string(), 0.1))
        } else {
            None
        };

        Some(FeedbackAnalysis {
            tenant_id: tenant_id.to_string(),
            request_id: request_id.to_string(),
            cause,
            confidence,
            explanation,
            suggested_weight_adjustment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use amber_core::error::AmberError;
    use amber_core::ports::{ChatMessage, GenerateResponse, GenerateStreamEvent, Usage};
    use futures::stream::BoxStream;

    struct FakeRepo {
        tenant: Tenant,
        config_calls: Mutex<u32>,
    }

    #[async_trait]
    impl TenantRepository for FakeRepo {
        async fn get(&self, _tenant_id: &str) -> Result<Option<Tenant>> {
            *self.config_calls.lock() += 1;
            Ok(Some(self.tenant.clone()))
        }
        async fn update_config(&self, _tenant_id: &str, patch: HashMap<String, Value>) -> Result<Tenant> {
            let mut tenant = self.tenant.clone();
            tenant.config.extend(patch);
            Ok(tenant)
        }
        async fn last_update_ts(&self, _tenant_id: &str) -> Result<chrono::DateTime<chrono::Utc>> {
            Ok(chrono::Utc::now())
        }
    }

    #[tokio::test]
    async fn repeated_lookups_hit_the_cache() {
        let repo = Arc::new(FakeRepo {
            tenant: Tenant::new("t1", "Acme"),
            config_calls: Mutex::new(0),
        });
        let store = TenantConfigStore::new(repo.clone());

        store.get_tenant_config("t1").await.unwrap();
        store.get_tenant_config("t1").await.unwrap();

        assert_eq!(*repo.config_calls.lock(), 1);
    }

    #[tokio::test]
    async fn updating_weights_invalidates_the_cache_and_logs_audit() {
        let repo = Arc::new(FakeRepo {
            tenant: Tenant::new("t1", "Acme"),
            config_calls: Mutex::new(0),
        });
        let store = TenantConfigStore::new(repo.clone());

        store.get_tenant_config("t1").await.unwrap();
        let mut weights = HashMap::new();
        weights.insert("graph".to_string(), 1.2);
        store.update_tenant_weights("t1", "admin", weights).await.unwrap();
        store.get_tenant_config("t1").await.unwrap();

        assert_eq!(*repo.config_calls.lock(), 2);
        assert_eq!(store.audit_log().len(), 1);
        assert_eq!(store.audit_log()[0].action, "update_weights");
    }

    struct FakeLlm {
        response: String,
    }

    #[async_trait]
    impl LLMProvider for FakeLlm {
        fn name(&self) -> &str {
            "fake"
        }
        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
            Ok(GenerateResponse {
                text: self.response.clone(),
                model: "fake-model".to_string(),
                provider: "fake".to_string(),
                usage: Usage::default(),
                finish_reason: "stop".to_string(),
                latency_ms: 1,
                cost_estimate: 0.0,
            })
        }
        async fn generate_stream(
            &self,
            _request: GenerateRequest,
        ) -> Result<BoxStream<'static, Result<GenerateStreamEvent>>> {
            Err(AmberError::internal("streaming not used in this test"))
        }
    }

    #[tokio::test]
    async fn positive_feedback_skips_analysis() {
        let repo = Arc::new(FakeRepo {
            tenant: Tenant::new("t1", "Acme"),
            config_calls: Mutex::new(0),
        });
        let store = TenantConfigStore::new(repo);
        let llm = FakeLlm { response: String::new() };

        let result = store
            .analyze_feedback_for_tuning(&llm, "t1", "req-1", true, None, &[])
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn high_confidence_retrieval_failure_suggests_weight_adjustment() {
        let repo = Arc::new(FakeRepo {
            tenant: Tenant::new("t1", "Acme"),
            config_calls: Mutex::new(0),
        });
        let store = TenantConfigStore::new(repo);
        let llm = FakeLlm {
            response: r#"{"reason": "RETRIEVAL_FAILURE", "confidence": 0.9, "explanation": "missing context"}"#.to_string(),
        };

        let result = store
            .analyze_feedback_for_tuning(&llm, "t1", "req-1", false, Some("wrong answer"), &[])
            .await
            .expect("analysis produced");

        assert_eq!(result.cause, FeedbackCause::RetrievalFailure);
        assert_eq!(result.suggested_weight_adjustment, Some(("graph_weight".to_string(), 0.1)));
    }

    #[tokio::test]
    async fn no_detail_feedback_skips_llm_call() {
        let repo = Arc::new(FakeRepo {
            tenant: Tenant::new("t1", "Acme"),
            config_calls: Mutex::new(0),
        });
        let store = TenantConfigStore::new(repo);
        let llm = FakeLlm { response: String::new() };

        let result = store
            .analyze_feedback_for_tuning(&llm, "t1", "req-1", false, None, &[])
            .await;
        assert!(result.is_none());
    }
}
