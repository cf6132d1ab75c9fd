//! Flat, typed process settings (spec §6 configuration surface).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-step LLM override: `{provider, model, temperature, seed}`
/// (spec §4.7 per-step configuration resolution).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StepConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub general_per_minute: u32,
    pub query_per_minute: u32,
    pub upload_per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_per_minute: 120,
            query_per_minute: 60,
            upload_per_hour: 50,
        }
    }
}

/// Capacity limiter pool sizing and per-class wait timeouts (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CapacityConfig {
    pub total: u32,
    pub reserved_chat: u32,
    pub reserved_ingestion: u32,
    pub lease_ttl_seconds: u64,
    pub chat_wait_timeout_ms: u64,
    pub ingestion_wait_timeout_ms: u64,
    pub communities_wait_timeout_ms: u64,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            total: 20,
            reserved_chat: 4,
            reserved_ingestion: 4,
            lease_ttl_seconds: 600,
            chat_wait_timeout_ms: 15_000,
            ingestion_wait_timeout_ms: 120_000,
            communities_wait_timeout_ms: 600_000,
        }
    }
}

/// Process-wide settings: environment + optional YAML overlay, the
/// lowest-precedence layer beneath tenant defaults and step overrides
/// (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub default_llm_provider: String,
    pub default_llm_model: String,
    pub default_embedding_provider: String,
    pub default_embedding_model: String,
    pub embedding_dimensions: usize,

    pub llm_steps: HashMap<String, StepConfig>,

    /// Models whose temperature is pinned by the "fixed" resolution
    /// strategy and never overridable by tenant config (open question,
    /// spec §9; resolved here as a configurable list rather than a
    /// hard-coded pair).
    pub fixed_temperature_models: Vec<String>,

    pub rate_limit: RateLimitConfig,
    pub capacity: CapacityConfig,

    pub upload_max_bytes: u64,
    pub db_pool_size: u32,

    pub result_cache_ttl_seconds: u64,
    pub embedding_cache_ttl_seconds: u64,

    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_cooldown_seconds: u64,

    pub retrieval_latency_window: usize,
    pub retrieval_latency_threshold_ms: u64,
    pub retrieval_degraded_enter_fraction: f32,
    pub retrieval_degraded_exit_fraction: f32,

    pub default_similarity_threshold: f32,

    /// Rough token budget for assembled generation prompts (spec
    /// §4.12), enforced the way `ContextAssembler` enforces
    /// `max_tokens` — 4 chars ≈ 1 token.
    pub generation_prompt_token_budget: usize,
    pub generation_max_user_facts: usize,
    pub generation_max_recent_summaries: usize,
    pub generation_system_rules: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_llm_provider: "openai".to_string(),
            default_llm_model: "gpt-4.1".to_string(),
            default_embedding_provider: "openai".to_string(),
            default_embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            llm_steps: HashMap::new(),
            fixed_temperature_models: vec!["gpt-4.1".to_string(), "o1".to_string()],
            rate_limit: RateLimitConfig::default(),
            capacity: CapacityConfig::default(),
            upload_max_bytes: 50 * 1024 * 1024,
            db_pool_size: 10,
            result_cache_ttl_seconds: 3600,
            embedding_cache_ttl_seconds: 86_400,
            circuit_breaker_failure_threshold: 5,
            circuit_breaker_cooldown_seconds: 300,
            retrieval_latency_window: 50,
            retrieval_latency_threshold_ms: 800,
            retrieval_degraded_enter_fraction: 0.5,
            retrieval_degraded_exit_fraction: 0.25,
            default_similarity_threshold: 0.7,
            generation_prompt_token_budget: 8000,
            generation_max_user_facts: 20,
            generation_max_recent_summaries: 5,
            generation_system_rules: "Answer only from the provided context. Cite sources using the given citation indices. Say so plainly if the context does not contain an answer.".to_string(),
        }
    }
}
