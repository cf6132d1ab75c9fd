//! Per-step LLM configuration resolution (spec §4.7).

use std::collections::HashMap;

use amber_config::{Settings, StepConfig};

/// A resolved step configuration: every field is guaranteed populated
/// once resolution has run through the precedence chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStepConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub seed: Option<u64>,
}

/// Resolves `{provider, model, temperature, seed}` for a named step
/// (e.g. `ingestion.graph_extraction`) by merging, in precedence order:
/// step override (tenant) -> tenant default -> settings default ->
/// hard-coded default (spec §4.7).
pub struct StepConfigResolver<'a> {
    settings: &'a Settings,
}

impl<'a> StepConfigResolver<'a> {
    #[must_use]
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn resolve(
        &self,
        step_id: &str,
        tenant_step_overrides: &HashMap<String, StepConfig>,
        tenant_default: Option<&StepConfig>,
    ) -> ResolvedStepConfig {
        let step_override = tenant_step_overrides.get(step_id);
        let process_default = self.settings.llm_steps.get(step_id);

        let provider = step_override
            .and_then(|c| c.provider.clone())
            .or_else(|| tenant_default.and_then(|c| c.provider.clone()))
            .or_else(|| process_default.and_then(|c| c.provider.clone()))
            .unwrap_or_else(|| self.settings.default_llm_provider.clone());

        let model = step_override
            .and_then(|c| c.model.clone())
            .or_else(|| tenant_default.and_then(|c| c.model.clone()))
            .or_else(|| process_default.and_then(|c| c.model.clone()))
            .unwrap_or_else(|| self.settings.default_llm_model.clone());

        let seed = step_override
            .and_then(|c| c.seed)
            .or_else(|| tenant_default.and_then(|c| c.seed))
            .or_else(|| process_default.and_then(|c| c.seed));

        // Fixed-temperature models pin their own temperature and ignore
        // every tenant-supplied override (spec §9 open question,
        // resolved as a configurable list rather than a hard-coded pair).
        let temperature = if self.settings.fixed_temperature_models.contains(&model) {
            1.0
        } else {
            step_override
                .and_then(|c| c.temperature)
                .or_else(|| tenant_default.and_then(|c| c.temperature))
                .or_else(|| process_default.and_then(|c| c.temperature))
                .unwrap_or(0.7)
        };

        ResolvedStepConfig {
            provider,
            model,
            temperature,
            seed,
        }
    }
}
