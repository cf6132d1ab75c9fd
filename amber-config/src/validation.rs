//! Eager validation of [`crate::Settings`] at load time (spec §6, §7).

use amber_core::error::{AmberError, Result};

use crate::settings::Settings;

/// Validate `settings`, returning the first violation found. Called once
/// at process startup; nothing downstream re-validates these invariants.
pub fn validate(settings: &Settings) -> Result<()> {
    if settings.embedding_dimensions == 0 {
        return Err(AmberError::configuration("embedding_dimensions must be > 0"));
    }
    if settings.default_llm_provider.trim().is_empty() {
        return Err(AmberError::configuration("default_llm_provider must not be empty"));
    }
    if settings.default_embedding_provider.trim().is_empty() {
        return Err(AmberError::configuration("default_embedding_provider must not be empty"));
    }
    if settings.capacity.reserved_chat + settings.capacity.reserved_ingestion > settings.capacity.total {
        return Err(AmberError::configuration(
            "capacity.reserved_chat + capacity.reserved_ingestion must not exceed capacity.total",
        ));
    }
    if !(0.0..=1.0).contains(&settings.retrieval_degraded_exit_fraction)
        || !(0.0..=1.0).contains(&settings.retrieval_degraded_enter_fraction)
    {
        return Err(AmberError::configuration(
            "retrieval degraded enter/exit fractions must be within [0, 1]",
        ));
    }
    if settings.retrieval_degraded_exit_fraction >= settings.retrieval_degraded_enter_fraction {
        return Err(AmberError::configuration(
            "retrieval_degraded_exit_fraction must be lower than retrieval_degraded_enter_fraction",
        ));
    }
    if !(0.0..=1.0).contains(&settings.default_similarity_threshold) {
        return Err(AmberError::configuration("default_similarity_threshold must be within [0, 1]"));
    }
    if settings.generation_prompt_token_budget == 0 {
        return Err(AmberError::configuration("generation_prompt_token_budget must be > 0"));
    }
    Ok(())
}
