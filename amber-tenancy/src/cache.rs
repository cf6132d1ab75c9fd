//! Embedding and retrieval-result caches (spec §4.10).
//!
//! Grounded on `examples/original_source/src/core/cache/{result_cache,semantic_cache}.py`:
//! SHA-256 keying and the tenant-timestamp staleness rule, reimplemented
//! against the `KV` port.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use amber_core::error::Result;
use amber_core::ports::KV;
use amber_core::types::CachedResult;

fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// query-text -> dense vector (spec §4.10).
pub struct EmbeddingCache {
    kv: Arc<dyn KV>,
    ttl_seconds: u64,
}

impl EmbeddingCache {
    #[must_use]
    pub fn new(kv: Arc<dyn KV>, ttl_seconds: u64) -> Self {
        Self { kv, ttl_seconds }
    }

    fn key(query: &str) -> String {
        format!("embcache:{}", sha256_hex(&normalize(query)))
    }

    pub async fn get(&self, query: &str) -> Result<Option<Vec<f32>>> {
        let Some(raw) = self.kv.get(&Self::key(query)).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_str(&raw).ok())
    }

    pub async fn set(&self, query: &str, vector: &[f32]) -> Result<()> {
        let payload = serde_json::to_string(vector).unwrap_or_default();
        self.kv.setex(&Self::key(query), self.ttl_seconds, &payload).await
    }
}

/// `(query, tenant, filters) -> {chunk_ids, scores, cached_at}` with
/// lazy invalidation against a per-tenant `last_update_ts` (spec §4.6,
/// §4.10).
pub struct ResultCache {
    kv: Arc<dyn KV>,
    ttl_seconds: u64,
}

impl ResultCache {
    #[must_use]
    pub fn new(kv: Arc<dyn KV>, ttl_seconds: u64) -> Self {
        Self { kv, ttl_seconds }
    }

    #[must_use]
    pub fn request_key(query: &str, tenant_id: &str, filters: &str) -> String {
        format!("resultcache:{}", sha256_hex(&format!("{}|{}|{}", normalize(query), tenant_id, filters)))
    }

    /// Returns `None` on a miss or on a stale hit — the caller cannot
    /// distinguish the two and should simply re-run the search (spec
    /// §4.6 step 5: "A hit is honored only if `cached_at ≥
    /// tenant_last_update_ts`").
    pub async fn get(
        &self,
        query: &str,
        tenant_id: &str,
        filters: &str,
        tenant_last_update_ts: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<CachedResult>> {
        let key = Self::request_key(query, tenant_id, filters);
        let Some(raw) = self.kv.get(&key).await? else {
            return Ok(None);
        };
        let Ok(cached) = serde_json::from_str::<CachedResult>(&raw) else {
            return Ok(None);
        };
        if cached.is_stale(tenant_last_update_ts) {
            return Ok(None);
        }
        Ok(Some(cached))
    }

    pub async fn set(&self, query: &str, filters: &str, result: &CachedResult) -> Result<()> {
        let key = Self::request_key(query, &result.tenant_id, filters);
        let payload = serde_json::to_string(result).unwrap_or_default();
        self.kv.setex(&key, self.ttl_seconds, &payload).await
    }
}
