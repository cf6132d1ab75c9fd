//! Process-level settings for the Amber GraphRAG service (spec §6).

pub mod env;
pub mod settings;
pub mod validation;

pub use settings::{CapacityConfig, RateLimitConfig, Settings, StepConfig};

use std::path::Path;

use amber_core::error::{AmberError, Result};

impl Settings {
    /// Build settings from hard-coded defaults, an optional YAML overlay
    /// file, and `AMBER_*` environment overrides, in that precedence
    /// order, then validate eagerly (spec §6: "process settings >
    /// defaults").
    pub async fn load(yaml_path: Option<&Path>) -> Result<Settings> {
        let mut settings = match yaml_path {
            Some(path) => Self::from_yaml_file(path).await?,
            None => Settings::default(),
        };

        env::apply_env_overrides(&mut settings);
        validation::validate(&settings)?;
        Ok(settings)
    }

    async fn from_yaml_file(path: &Path) -> Result<Settings> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AmberError::configuration(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml_str(&contents)
    }

    fn from_yaml_str(contents: &str) -> Result<Settings> {
        serde_yaml::from_str(contents)
            .map_err(|e| AmberError::configuration(format!("invalid settings YAML: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_defaults_with_no_overlay() {
        let settings = Settings::load(None).await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn yaml_overlay_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        tokio::fs::write(&path, "default_llm_provider: anthropic\nembedding_dimensions: 768\n")
            .await
            .unwrap();

        let settings = Settings::load(Some(&path)).await.unwrap();
        assert_eq!(settings.default_llm_provider, "anthropic");
        assert_eq!(settings.embedding_dimensions, 768);
    }

    #[tokio::test]
    async fn invalid_overlay_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        tokio::fs::write(&path, "embedding_dimensions: 0\n").await.unwrap();

        let err = Settings::load(Some(&path)).await.unwrap_err();
        assert!(matches!(err, AmberError::Configuration { .. }));
    }
}
