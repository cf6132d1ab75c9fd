//! Entity/relation extraction: LLM-driven with a regex fallback (spec
//! §4.4 step 1). Grounded structurally on
//! `llmspell-graph/src/extraction/regex.rs`'s pattern set, reduced to
//! the handful of relations a fallback needs to be useful rather than
//! a full extraction engine.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::warn;

use amber_core::error::Result;
use amber_core::ports::{GenerateRequest, LLMProvider};
use amber_core::types::sanitize_relation_type;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEntity {
    pub name: String,
    pub entity_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRelation {
    pub source: String,
    pub target: String,
    pub relation_type: String,
    pub description: String,
    pub weight: f32,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub entities: Vec<ExtractedEntity>,
    pub relations: Vec<ExtractedRelation>,
}

#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<ExtractionResult>;
}

/// Primary extractor: a single LLM call asked to emit entities/typed
/// relations as JSON, with an optional second "gleaning" pass over the
/// same text to catch what the first pass missed (spec §4.4 step 1).
pub struct LlmEntityExtractor {
    llm: Arc<dyn LLMProvider>,
    model: Option<String>,
    gleaning_pass: bool,
}

impl LlmEntityExtractor {
    #[must_use]
    pub fn new(llm: Arc<dyn LLMProvider>, model: Option<String>, gleaning_pass: bool) -> Self {
        Self { llm, model, gleaning_pass }
    }

    fn prompt(text: &str) -> String {
        format!(
            "Extract entities and relationships from the text below. Respond with only a \
             JSON object of shape {{\"entities\":[{{\"name\":str,\"entity_type\":str,\"description\":str}}],\
             \"relations\":[{{\"source\":str,\"target\":str,\"relation_type\":str,\"description\":str,\"weight\":number}}]}}.\n\n{text}"
        )
    }

    async fn call_llm(&self, text: &str) -> Result<ExtractionResult> {
        let response = self
            .llm
            .generate(GenerateRequest {
                prompt: Self::prompt(text),
                model: self.model.clone(),
                temperature: 0.0,
                max_tokens: Some(1024),
                ..Default::default()
            })
            .await?;

        Ok(parse_extraction_json(&response.text))
    }
}

#[async_trait]
impl EntityExtractor for LlmEntityExtractor {
    async fn extract(&self, text: &str) -> Result<ExtractionResult> {
        let mut result = self.call_llm(text).await?;

        if self.gleaning_pass {
            match self.call_llm(text).await {
                Ok(second_pass) => {
                    let known: std::collections::HashSet<String> = result.entities.iter().map(|e| e.name.clone()).collect();
                    result.entities.extend(second_pass.entities.into_iter().filter(|e| !known.contains(&e.name)));
                    result.relations.extend(second_pass.relations);
                }
                Err(err) => warn!(error = %err, "gleaning pass failed, keeping first-pass extraction"),
            }
        }

        Ok(result)
    }
}

fn parse_extraction_json(text: &str) -> ExtractionResult {
    let cleaned = text.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```").trim();

    let Ok(value) = serde_json::from_str::<serde_json::Value>(cleaned) else {
        warn!("entity extraction response was not valid JSON, returning empty result");
        return ExtractionResult::default();
    };

    let entities = value
        .get("entities")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|e| {
                    Some(ExtractedEntity {
                        name: e.get("name")?.as_str()?.to_string(),
                        entity_type: e.get("entity_type").and_then(|v| v.as_str()).unwrap_or("UNKNOWN").to_string(),
                        description: e.get("description").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let relations = value
        .get("relations")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|r| {
                    let source = r.get("source")?.as_str()?.to_string();
                    let target = r.get("target")?.as_str()?.to_string();
                    let raw_type = r.get("relation_type").and_then(|v| v.as_str()).unwrap_or_default();
                    Some(ExtractedRelation {
                        source,
                        target,
                        relation_type: sanitize_relation_type(raw_type),
                        description: r.get("description").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        weight: r.get("weight").and_then(serde_json::Value::as_f64).unwrap_or(1.0) as f32,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    ExtractionResult { entities, relations }
}

static IS_A_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([A-Z][a-zA-Z0-9]+(?:\s+[A-Z][a-zA-Z0-9]+)*)\s+is\s+an?\s+([a-z][a-zA-Z0-9\s-]{2,40}?)(?:[.,;]|$)").unwrap()
});
static WORKS_FOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][a-zA-Z0-9]+(?:\s+[A-Z][a-zA-Z0-9]+)*)\s+works\s+(?:for|at)\s+([A-Z][a-zA-Z0-9]+(?:\s+[A-Z][a-zA-Z0-9]+)*)").unwrap()
});
static LOCATED_IN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][a-zA-Z0-9]+(?:\s+[A-Z][a-zA-Z0-9]+)*)\s+(?:in|located\s+in)\s+([A-Z][a-zA-Z0-9]+(?:\s+[A-Z][a-zA-Z0-9]+)*)\b").unwrap()
});

/// Zero-LLM fallback used when the provider tier is unavailable.
/// Covers a handful of high-precision patterns rather than attempting
/// full recall; callers should prefer `LlmEntityExtractor` when a
/// provider is reachable.
#[derive(Debug, Default)]
pub struct RegexEntityExtractor;

impl RegexEntityExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EntityExtractor for RegexEntityExtractor {
    async fn extract(&self, text: &str) -> Result<ExtractionResult> {
        let mut entities = Vec::new();
        let mut relations = Vec::new();
        let mut seen_entities = std::collections::HashSet::new();

        let mut push_entity = |name: &str, entities: &mut Vec<ExtractedEntity>, seen: &mut std::collections::HashSet<String>| {
            if seen.insert(name.to_string()) {
                entities.push(ExtractedEntity { name: name.to_string(), entity_type: "UNKNOWN".to_string(), description: String::new() });
            }
        };

        for capture in IS_A_PATTERN.captures_iter(text) {
            let source = capture[1].trim().to_string();
            let target = capture[2].trim().to_string();
            push_entity(&source, &mut entities, &mut seen_entities);
            push_entity(&target, &mut entities, &mut seen_entities);
            relations.push(ExtractedRelation {
                source,
                target,
                relation_type: "IS_A".to_string(),
                description: String::new(),
                weight: 1.0,
            });
        }

        for capture in WORKS_FOR_PATTERN.captures_iter(text) {
            let source = capture[1].trim().to_string();
            let target = capture[2].trim().to_string();
            push_entity(&source, &mut entities, &mut seen_entities);
            push_entity(&target, &mut entities, &mut seen_entities);
            relations.push(ExtractedRelation {
                source,
                target,
                relation_type: "WORKS_FOR".to_string(),
                description: String::new(),
                weight: 1.0,
            });
        }

        for capture in LOCATED_IN_PATTERN.captures_iter(text) {
            let source = capture[1].trim().to_string();
            let target = capture[2].trim().to_string();
            push_entity(&source, &mut entities, &mut seen_entities);
            push_entity(&target, &mut entities, &mut seen_entities);
            relations.push(ExtractedRelation {
                source,
                target,
                relation_type: "LOCATED_IN".to_string(),
                description: String::new(),
                weight: 1.0,
            });
        }

        Ok(ExtractionResult { entities, relations })
    }
}
