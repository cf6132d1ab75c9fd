//! Per-tenant sliding-window rate limiting (spec §4.9).
//!
//! Grounded on `examples/original_source/src/core/admin_ops/infrastructure/rate_limiter.py`
//! (categories, per-category window sizes) reimplemented against the
//! `KV` port.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use amber_core::error::Result;
use amber_core::ports::KV;

use amber_config::RateLimitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitCategory {
    General,
    Query,
    Upload,
}

impl RateLimitCategory {
    fn as_str(self) -> &'static str {
        match self {
            RateLimitCategory::General => "general",
            RateLimitCategory::Query => "query",
            RateLimitCategory::Upload => "upload",
        }
    }

    fn window_and_limit(self, config: &RateLimitConfig) -> (u32, f64) {
        match self {
            RateLimitCategory::General => (config.general_per_minute, 60.0),
            RateLimitCategory::Query => (config.query_per_minute, 60.0),
            RateLimitCategory::Upload => (config.upload_per_hour, 3600.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_seconds: Option<f64>,
}

pub struct RateLimiter {
    kv: Arc<dyn KV>,
    config: RateLimitConfig,
    concurrent: DashMap<(String, String), u32>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(kv: Arc<dyn KV>, config: RateLimitConfig) -> Self {
        Self {
            kv,
            config,
            concurrent: DashMap::new(),
        }
    }

    /// Atomically check-and-record one request against the tenant's
    /// sliding window for `category`. Fails open on KV failure (spec
    /// §7: "Rate-limit backend failure fails open").
    pub async fn check(&self, tenant_id: &str, category: RateLimitCategory) -> RateLimitResult {
        let (limit, window_seconds) = category.window_and_limit(&self.config);
        let key = format!("ratelimit:{tenant_id}:{}", category.as_str());
        let now_s = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;

        let args = vec![now_s.to_string(), window_seconds.to_string(), limit.to_string()];
        match self.kv.eval_script("rate_limit_check", &[key], &args).await {
            Ok(raw) => parse_result(&raw, limit),
            Err(err) => {
                warn!(error = %err, tenant_id, "rate limiter bypass: kv unavailable");
                RateLimitResult {
                    allowed: true,
                    remaining: limit,
                    retry_after_seconds: None,
                }
            }
        }
    }

    /// Simple in-memory concurrency counters, not KV-backed: per-process
    /// only, safe to reset on restart rather than surviving a crash
    /// (spec §4.9 concurrency tracking).
    pub fn check_concurrent(&self, tenant_id: &str, category: &str, limit: u32) -> bool {
        let count = self
            .concurrent
            .get(&(tenant_id.to_string(), category.to_string()))
            .map_or(0, |v| *v);
        count < limit
    }

    pub fn increment_concurrent(&self, tenant_id: &str, category: &str) {
        *self.concurrent.entry((tenant_id.to_string(), category.to_string())).or_insert(0) += 1;
    }

    pub fn decrement_concurrent(&self, tenant_id: &str, category: &str) {
        if let Some(mut entry) = self.concurrent.get_mut(&(tenant_id.to_string(), category.to_string())) {
            *entry = entry.saturating_sub(1);
        }
    }
}

fn parse_result(raw: &str, limit: u32) -> RateLimitResult {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => {
            return RateLimitResult {
                allowed: true,
                remaining: limit,
                retry_after_seconds: None,
            }
        }
    };
    RateLimitResult {
        allowed: value.get("allowed").and_then(serde_json::Value::as_bool).unwrap_or(true),
        remaining: value
            .get("remaining")
            .and_then(serde_json::Value::as_u64)
            .map_or(limit, |v| v as u32),
        retry_after_seconds: value.get("retry_after").and_then(serde_json::Value::as_f64),
    }
}
