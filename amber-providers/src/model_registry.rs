//! Static model catalog with provider-ambiguity detection (spec §4.7).
//!
//! Grounded on `examples/original_source/src/shared/model_registry.py`:
//! the catalog shape and `resolve_provider_for_model` ambiguity guard.

use std::collections::{HashMap, HashSet};

use amber_core::error::{AmberError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Local,
    Economy,
    Standard,
    Premium,
}

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub tier: ModelTier,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
    pub dimensions: Option<usize>,
    pub context_window: Option<u32>,
}

/// `{provider -> {model -> ModelInfo}}` plus a reverse index used to
/// detect ambiguous "model only" lookups (spec §4.7).
pub struct ModelRegistry {
    catalog: HashMap<String, HashMap<String, ModelInfo>>,
    model_to_providers: HashMap<String, HashSet<String>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut catalog: HashMap<String, HashMap<String, ModelInfo>> = HashMap::new();

        catalog.insert(
            "openai".to_string(),
            HashMap::from([
                (
                    "gpt-4.1".to_string(),
                    ModelInfo {
                        tier: ModelTier::Standard,
                        input_cost_per_1k: 0.005,
                        output_cost_per_1k: 0.015,
                        dimensions: None,
                        context_window: Some(128_000),
                    },
                ),
                (
                    "gpt-4.1-mini".to_string(),
                    ModelInfo {
                        tier: ModelTier::Economy,
                        input_cost_per_1k: 0.00015,
                        output_cost_per_1k: 0.0006,
                        dimensions: None,
                        context_window: Some(128_000),
                    },
                ),
                (
                    "o1".to_string(),
                    ModelInfo {
                        tier: ModelTier::Premium,
                        input_cost_per_1k: 0.015,
                        output_cost_per_1k: 0.06,
                        dimensions: None,
                        context_window: Some(200_000),
                    },
                ),
                (
                    "text-embedding-3-small".to_string(),
                    ModelInfo {
                        tier: ModelTier::Economy,
                        input_cost_per_1k: 0.00002,
                        output_cost_per_1k: 0.0,
                        dimensions: Some(1536),
                        context_window: None,
                    },
                ),
            ]),
        );

        catalog.insert(
            "anthropic".to_string(),
            HashMap::from([(
                "claude-sonnet-4".to_string(),
                ModelInfo {
                    tier: ModelTier::Standard,
                    input_cost_per_1k: 0.003,
                    output_cost_per_1k: 0.015,
                    dimensions: None,
                    context_window: Some(200_000),
                },
            )]),
        );

        catalog.insert(
            "ollama".to_string(),
            HashMap::from([(
                "llama3".to_string(),
                ModelInfo {
                    tier: ModelTier::Local,
                    input_cost_per_1k: 0.0,
                    output_cost_per_1k: 0.0,
                    dimensions: None,
                    context_window: None,
                },
            )]),
        );

        let mut registry = Self {
            catalog,
            model_to_providers: HashMap::new(),
        };
        registry.reindex();
        registry
    }

    fn reindex(&mut self) {
        let mut index: HashMap<String, HashSet<String>> = HashMap::new();
        for (provider, models) in &self.catalog {
            for model in models.keys() {
                index.entry(model.clone()).or_default().insert(provider.clone());
            }
        }
        self.model_to_providers = index;
    }

    #[must_use]
    pub fn model_info(&self, provider: &str, model: &str) -> Option<&ModelInfo> {
        self.catalog.get(provider)?.get(model)
    }

    /// Resolve the single provider that serves `model`. Raises a
    /// `Configuration` error if the model is unregistered or, crucially,
    /// registered under more than one provider (spec §4.7: "Model→
    /// providers is indexed to detect ambiguous 'model only' lookups").
    pub fn resolve_provider_for_model(&self, model: &str) -> Result<String> {
        let providers = self.model_to_providers.get(model).cloned().unwrap_or_default();
        match providers.len() {
            0 => Err(AmberError::configuration(format!("model '{model}' is not registered with any provider"))),
            1 => Ok(providers.into_iter().next().unwrap()),
            _ => {
                let mut names: Vec<_> = providers.into_iter().collect();
                names.sort();
                Err(AmberError::configuration(format!(
                    "model '{model}' is available from multiple providers [{}]; set provider explicitly",
                    names.join(", ")
                )))
            }
        }
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unambiguous_model_resolves_to_its_provider() {
        let registry = ModelRegistry::with_defaults();
        assert_eq!(registry.resolve_provider_for_model("gpt-4.1").unwrap(), "openai");
    }

    #[test]
    fn unknown_model_is_a_configuration_error() {
        let registry = ModelRegistry::with_defaults();
        assert!(registry.resolve_provider_for_model("nonexistent-model").is_err());
    }

    #[test]
    fn ambiguous_model_across_providers_is_a_configuration_error() {
        let mut registry = ModelRegistry::with_defaults();
        registry
            .catalog
            .get_mut("anthropic")
            .unwrap()
            .insert("gpt-4.1".to_string(), registry.catalog["openai"]["gpt-4.1"].clone());
        registry.reindex();

        let err = registry.resolve_provider_for_model("gpt-4.1").unwrap_err();
        assert!(matches!(err, AmberError::Configuration { .. }));
    }
}
