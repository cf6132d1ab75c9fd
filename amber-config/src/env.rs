//! Environment variable overlay for [`crate::Settings`] (spec §6).
//!
//! Every variable is prefixed `AMBER_`. Only scalar top-level fields are
//! overridable from the environment; `llm_steps` is YAML-only since it
//! is a nested map.

use std::env;

use crate::settings::Settings;

const ENV_PREFIX: &str = "AMBER_";

fn var(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn parse_var<T: std::str::FromStr>(name: &str, into: &mut T) {
    if let Some(raw) = var(name) {
        match raw.parse() {
            Ok(value) => *into = value,
            Err(_) => tracing::warn!(var = name, value = %raw, "ignoring unparseable env override"),
        }
    }
}

/// Apply `AMBER_*` environment overrides onto `settings` in place.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Some(value) = var("DEFAULT_LLM_PROVIDER") {
        settings.default_llm_provider = value;
    }
    if let Some(value) = var("DEFAULT_LLM_MODEL") {
        settings.default_llm_model = value;
    }
    if let Some(value) = var("DEFAULT_EMBEDDING_PROVIDER") {
        settings.default_embedding_provider = value;
    }
    if let Some(value) = var("DEFAULT_EMBEDDING_MODEL") {
        settings.default_embedding_model = value;
    }
    parse_var("EMBEDDING_DIMENSIONS", &mut settings.embedding_dimensions);
    parse_var("UPLOAD_MAX_BYTES", &mut settings.upload_max_bytes);
    parse_var("DB_POOL_SIZE", &mut settings.db_pool_size);
    parse_var("RESULT_CACHE_TTL_SECONDS", &mut settings.result_cache_ttl_seconds);
    parse_var("EMBEDDING_CACHE_TTL_SECONDS", &mut settings.embedding_cache_ttl_seconds);
    parse_var("CIRCUIT_BREAKER_FAILURE_THRESHOLD", &mut settings.circuit_breaker_failure_threshold);
    parse_var("CIRCUIT_BREAKER_COOLDOWN_SECONDS", &mut settings.circuit_breaker_cooldown_seconds);
    parse_var("DEFAULT_SIMILARITY_THRESHOLD", &mut settings.default_similarity_threshold);

    parse_var("RATE_LIMIT_GENERAL_PER_MINUTE", &mut settings.rate_limit.general_per_minute);
    parse_var("RATE_LIMIT_QUERY_PER_MINUTE", &mut settings.rate_limit.query_per_minute);
    parse_var("RATE_LIMIT_UPLOAD_PER_HOUR", &mut settings.rate_limit.upload_per_hour);

    parse_var("CAPACITY_TOTAL", &mut settings.capacity.total);
    parse_var("CAPACITY_RESERVED_CHAT", &mut settings.capacity.reserved_chat);
    parse_var("CAPACITY_RESERVED_INGESTION", &mut settings.capacity.reserved_ingestion);
    parse_var("CAPACITY_LEASE_TTL_SECONDS", &mut settings.capacity.lease_ttl_seconds);

    parse_var("GENERATION_PROMPT_TOKEN_BUDGET", &mut settings.generation_prompt_token_budget);
    parse_var("GENERATION_MAX_USER_FACTS", &mut settings.generation_max_user_facts);
    parse_var("GENERATION_MAX_RECENT_SUMMARIES", &mut settings.generation_max_recent_summaries);
}
