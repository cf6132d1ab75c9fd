//! Entity/Relation/Community graph types (spec §3, §4.4).

use serde::{Deserialize, Serialize};

/// A named graph node within a tenant (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub name: String,
    pub tenant_id: String,
    pub entity_type: String,
    pub description: String,
    pub aliases: Vec<String>,
    pub community: Option<String>,
}

impl Entity {
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tenant_id: tenant_id.into(),
            entity_type: entity_type.into(),
            description: String::new(),
            aliases: Vec::new(),
            community: None,
        }
    }
}

/// Directed typed edge between two entities (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    pub source: String,
    pub target: String,
    pub relation_type: String,
    pub description: String,
    pub weight: f32,
    pub tenant_id: String,
}

/// Default relation type when LLM output cannot be coerced to a valid
/// upper-snake-case type (spec §4.4).
pub const DEFAULT_RELATION_TYPE: &str = "RELATED_TO";

/// Sanitize an LLM-produced relation type into upper-snake-case,
/// stripping illegal characters, defaulting to [`DEFAULT_RELATION_TYPE`]
/// when nothing usable remains (spec §4.4 step 1).
#[must_use]
pub fn sanitize_relation_type(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ' ' || c == '-' {
            c
        } else {
            ' '
        })
        .collect();

    let upper_snake: String = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .replace('-', "_")
        .to_uppercase();

    if upper_snake.is_empty() || !upper_snake.chars().any(|c| c.is_ascii_alphabetic()) {
        DEFAULT_RELATION_TYPE.to_string()
    } else {
        upper_snake
    }
}

/// A cluster of related entities, summarized for global search (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Community {
    pub id: String,
    pub tenant_id: String,
    pub level: u32,
    pub title: String,
    pub summary: String,
    pub key_entities: Vec<String>,
    pub rating: Option<f32>,
    pub status: String,
    pub is_stale: bool,
}

/// Relationship types excluded from beam-search traversal expansion
/// (spec §4.6).
pub const TRAVERSAL_EXCLUDED_RELATION_TYPES: &[&str] = &["BELONGS_TO", "PARENT_OF"];
