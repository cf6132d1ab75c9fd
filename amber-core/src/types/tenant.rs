//! Tenant — the isolation root (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tenant: the isolation boundary across all data, caches, and counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub config: HashMap<String, serde_json::Value>,
}

impl Tenant {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            active: true,
            config: HashMap::new(),
        }
    }

    /// The tenant's active vector collection name: `amber_<tenant_id>`
    /// with `-` replaced by `_` (spec §3).
    #[must_use]
    pub fn collection_name(&self) -> String {
        Self::collection_name_for(&self.id)
    }

    /// Derive a collection name for a raw tenant id without requiring a
    /// `Tenant` instance (used by ingestion/retrieval call sites that
    /// only have the id on hand). Centralizing this avoids re-deriving
    /// the sanitization rule at each call site.
    #[must_use]
    pub fn collection_name_for(tenant_id: &str) -> String {
        format!("amber_{}", tenant_id.replace('-', "_"))
    }
}
