//! Domain classification for extracted content (spec §4.2 step 3).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::warn;

use amber_core::error::Result;
use amber_core::ports::{GenerateRequest, LLMProvider};

const CLASSIFY_PREFIX_CHARS: usize = 2_000;

const KEYWORD_DOMAINS: &[(&str, &[&str])] = &[
    ("legal", &["whereas", "plaintiff", "defendant", "jurisdiction", "pursuant"]),
    ("code", &["fn ", "function ", "class ", "import ", "def "]),
    ("medical", &["diagnosis", "patient", "symptom", "treatment", "prescribed"]),
    ("finance", &["invoice", "balance sheet", "revenue", "quarterly", "shareholder"]),
];

/// Classifies document domain via a cached LLM call keyed by
/// SHA-256 of the first 2,000 chars, falling back to a keyword
/// heuristic when the LLM tier is unavailable (spec §4.2 step 3).
pub struct DomainClassifier {
    llm: Arc<dyn LLMProvider>,
    model: Option<String>,
    cache: Mutex<HashMap<String, String>>,
}

impl DomainClassifier {
    #[must_use]
    pub fn new(llm: Arc<dyn LLMProvider>, model: Option<String>) -> Self {
        Self { llm, model, cache: Mutex::new(HashMap::new()) }
    }

    fn cache_key(content: &str) -> String {
        let prefix: String = content.chars().take(CLASSIFY_PREFIX_CHARS).collect();
        let mut hasher = Sha256::new();
        hasher.update(prefix.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn keyword_fallback(content: &str) -> String {
        let lower = content.to_lowercase();
        for (domain, keywords) in KEYWORD_DOMAINS {
            if keywords.iter().any(|kw| lower.contains(kw)) {
                return (*domain).to_string();
            }
        }
        "general".to_string()
    }

    pub async fn classify(&self, content: &str) -> Result<String> {
        let key = Self::cache_key(content);
        if let Some(domain) = self.cache.lock().get(&key).cloned() {
            return Ok(domain);
        }

        let prefix: String = content.chars().take(CLASSIFY_PREFIX_CHARS).collect();
        let prompt = format!(
            "Classify the domain of the following document in a single lowercase word \
             (e.g. legal, medical, finance, code, general). Respond with only the word.\n\n{prefix}"
        );

        let domain = match self
            .llm
            .generate(GenerateRequest {
                prompt,
                model: self.model.clone(),
                temperature: 0.0,
                max_tokens: Some(8),
                ..Default::default()
            })
            .await
        {
            Ok(response) => response.text.trim().to_lowercase(),
            Err(err) => {
                warn!(error = %err, "domain classification LLM call failed, using keyword heuristic");
                Self::keyword_fallback(content)
            }
        };

        self.cache.lock().insert(key, domain.clone());
        Ok(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::BoxStream;

    use amber_core::error::AmberError;
    use amber_core::ports::{GenerateResponse, GenerateStreamEvent, Usage};

    struct StubLlm {
        fail: bool,
        response: String,
    }

    #[async_trait]
    impl LLMProvider for StubLlm {
        fn name(&self) -> &str {
            "stub"
        }
        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
            if self.fail {
                return Err(AmberError::ProviderUnavailable { message: "down".to_string() });
            }
            Ok(GenerateResponse {
                text: self.response.clone(),
                model: "test".to_string(),
                provider: "stub".to_string(),
                usage: Usage::default(),
                finish_reason: "stop".to_string(),
                latency_ms: 1,
                cost_estimate: 0.0,
            })
        }
        async fn generate_stream(&self, _request: GenerateRequest) -> Result<BoxStream<'static, Result<GenerateStreamEvent>>> {
            Err(AmberError::internal("not used"))
        }
    }

    #[tokio::test]
    async fn classifies_via_llm_and_caches_result() {
        let llm = Arc::new(StubLlm { fail: false, response: "Legal".to_string() });
        let classifier = DomainClassifier::new(llm, None);
        let domain = classifier.classify("some contract text").await.unwrap();
        assert_eq!(domain, "legal");
    }

    #[tokio::test]
    async fn falls_back_to_keyword_heuristic_when_llm_unavailable() {
        let llm = Arc::new(StubLlm { fail: true, response: String::new() });
        let classifier = DomainClassifier::new(llm, None);
        let domain = classifier.classify("whereas the plaintiff alleges breach of contract").await.unwrap();
        assert_eq!(domain, "legal");
    }

    #[tokio::test]
    async fn keyword_fallback_defaults_to_general() {
        let llm = Arc::new(StubLlm { fail: true, response: String::new() });
        let classifier = DomainClassifier::new(llm, None);
        let domain = classifier.classify("just some ordinary prose about a sunny day").await.unwrap();
        assert_eq!(domain, "general");
    }
}
