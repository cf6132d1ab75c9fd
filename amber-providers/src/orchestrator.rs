//! Provider failover chain with circuit breaking (spec §4.7).

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use amber_core::error::{AmberError, Result};
use amber_core::ports::{GenerateRequest, GenerateResponse, LLMProvider};

use crate::circuit_breaker::CircuitBreaker;
use crate::usage::UsageLog;

struct ChainEntry {
    name: String,
    provider: Arc<dyn LLMProvider>,
    breaker: CircuitBreaker,
}

/// Walks an ordered list of concrete providers, skipping any whose
/// circuit is `OPEN`. Retryable errors record a breaker failure and
/// advance to the next provider; authentication/invalid-request errors
/// advance without touching the breaker (spec §4.7).
pub struct ProviderOrchestrator {
    chain: Vec<ChainEntry>,
    usage_log: Arc<UsageLog>,
}

impl ProviderOrchestrator {
    #[must_use]
    pub fn new(
        providers: Vec<(String, Arc<dyn LLMProvider>)>,
        failure_threshold: u32,
        cooldown: Duration,
        usage_log: Arc<UsageLog>,
    ) -> Self {
        let chain = providers
            .into_iter()
            .map(|(name, provider)| ChainEntry {
                name,
                provider,
                breaker: CircuitBreaker::new(failure_threshold, cooldown),
            })
            .collect();
        Self { chain, usage_log }
    }

    pub async fn generate(
        &self,
        tenant_id: &str,
        operation: &str,
        request: GenerateRequest,
        request_id: &str,
    ) -> Result<GenerateResponse> {
        let mut last_error = None;

        for entry in &self.chain {
            if !entry.breaker.allow_request() {
                debug!(provider = %entry.name, "skipping provider: circuit open");
                continue;
            }

            match entry.provider.generate(request.clone()).await {
                Ok(response) => {
                    entry.breaker.record_success();
                    self.usage_log.record(
                        tenant_id,
                        operation,
                        &entry.name,
                        &response.model,
                        response.usage,
                        response.cost_estimate,
                        request_id,
                        None,
                        std::collections::HashMap::new(),
                    );
                    return Ok(response);
                }
                Err(err) => {
                    if err.is_permanent_config_error() {
                        warn!(provider = %entry.name, error = %err, "permanent config error, advancing chain without recording failure");
                    } else if err.is_retryable() {
                        entry.breaker.record_failure();
                        warn!(provider = %entry.name, error = %err, "provider call failed, recording breaker failure");
                    } else {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AmberError::ProviderUnavailable {
            message: "no providers available in failover chain".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use parking_lot::Mutex;

    use amber_core::ports::{GenerateStreamEvent, Usage};

    struct ScriptedProvider {
        name: String,
        responses: Mutex<Vec<Result<GenerateResponse>>>,
    }

    fn response(provider: &str) -> GenerateResponse {
        GenerateResponse {
            text: "ok".to_string(),
            model: "test-model".to_string(),
            provider: provider.to_string(),
            usage: Usage { tokens_in: 1, tokens_out: 1 },
            finish_reason: "stop".to_string(),
            latency_ms: 1,
            cost_estimate: 0.001,
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }
        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
            self.responses.lock().remove(0)
        }
        async fn generate_stream(&self, _request: GenerateRequest) -> Result<BoxStream<'static, Result<GenerateStreamEvent>>> {
            Err(AmberError::internal("not used"))
        }
    }

    #[tokio::test]
    async fn falls_back_to_next_provider_on_transient_error() {
        let failing = Arc::new(ScriptedProvider {
            name: "primary".to_string(),
            responses: Mutex::new(vec![Err(AmberError::ProviderUnavailable { message: "down".to_string() })]),
        });
        let healthy = Arc::new(ScriptedProvider {
            name: "secondary".to_string(),
            responses: Mutex::new(vec![Ok(response("secondary"))]),
        });

        let orchestrator = ProviderOrchestrator::new(
            vec![("primary".to_string(), failing), ("secondary".to_string(), healthy)],
            5,
            Duration::from_secs(300),
            Arc::new(UsageLog::new()),
        );

        let result = orchestrator
            .generate("t1", "chat.generation", GenerateRequest::default(), "req-1")
            .await
            .unwrap();
        assert_eq!(result.provider, "secondary");
    }

    #[tokio::test]
    async fn auth_error_advances_without_opening_breaker() {
        let failing = Arc::new(ScriptedProvider {
            name: "primary".to_string(),
            responses: Mutex::new(vec![Err(AmberError::Authentication { message: "bad key".to_string() })]),
        });
        let healthy = Arc::new(ScriptedProvider {
            name: "secondary".to_string(),
            responses: Mutex::new(vec![Ok(response("secondary"))]),
        });

        let orchestrator = ProviderOrchestrator::new(
            vec![("primary".to_string(), failing), ("secondary".to_string(), healthy)],
            1,
            Duration::from_secs(300),
            Arc::new(UsageLog::new()),
        );

        let result = orchestrator
            .generate("t1", "chat.generation", GenerateRequest::default(), "req-1")
            .await
            .unwrap();
        assert_eq!(result.provider, "secondary");
        assert_eq!(orchestrator.chain[0].breaker.state(), crate::circuit_breaker::CircuitState::Closed);
    }

    #[tokio::test]
    async fn exhausted_chain_returns_last_error() {
        let failing = Arc::new(ScriptedProvider {
            name: "primary".to_string(),
            responses: Mutex::new(vec![Err(AmberError::ProviderUnavailable { message: "down".to_string() })]),
        });

        let orchestrator = ProviderOrchestrator::new(
            vec![("primary".to_string(), failing)],
            5,
            Duration::from_secs(300),
            Arc::new(UsageLog::new()),
        );

        let result = orchestrator.generate("t1", "chat.generation", GenerateRequest::default(), "req-1").await;
        assert!(result.is_err());
    }
}
