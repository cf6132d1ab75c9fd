//! Retrieval result cache entry (spec §3, §4.6).

use serde::{Deserialize, Serialize};

/// A cached retrieval result for a given tenant/query-key. Invalidated
/// lazily: a cached entry is stale whenever it predates the tenant's
/// last mutating update rather than on a fixed TTL (spec §4.6, C10).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedResult {
    pub tenant_id: String,
    pub chunk_ids: Vec<String>,
    pub scores: Vec<f32>,
    pub cached_at: chrono::DateTime<chrono::Utc>,
}

impl CachedResult {
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, chunk_ids: Vec<String>, scores: Vec<f32>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            chunk_ids,
            scores,
            cached_at: chrono::Utc::now(),
        }
    }

    /// A cache entry is stale once the tenant's data has moved on past it.
    #[must_use]
    pub fn is_stale(&self, tenant_last_update_ts: chrono::DateTime<chrono::Utc>) -> bool {
        self.cached_at < tenant_last_update_ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn stale_when_cached_before_last_update() {
        let entry = CachedResult::new("t1", vec!["c1".into()], vec![0.9]);
        let later = entry.cached_at + Duration::seconds(1);
        assert!(entry.is_stale(later));
    }

    #[test]
    fn fresh_when_cached_after_last_update() {
        let entry = CachedResult::new("t1", vec!["c1".into()], vec![0.9]);
        let earlier = entry.cached_at - Duration::seconds(1);
        assert!(!entry.is_stale(earlier));
    }
}
