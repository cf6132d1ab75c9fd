//! Distributed lease-based capacity limiter over LLM calls (spec §4.8).
//!
//! Grounded on `examples/original_source/src/shared/llm_capacity.py`:
//! reservation math and fail-open behavior reimplemented against the
//! `KV` port instead of a Redis client directly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

use amber_core::error::{AmberError, Result};
use amber_core::ports::KV;

use amber_config::CapacityConfig;

/// Priority class ordering `chat > ingestion > communities` (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkClass {
    Chat,
    Ingestion,
    Communities,
}

impl WorkClass {
    fn as_str(self) -> &'static str {
        match self {
            WorkClass::Chat => "chat",
            WorkClass::Ingestion => "ingestion",
            WorkClass::Communities => "communities",
        }
    }

    fn wait_timeout(self, config: &CapacityConfig) -> Duration {
        let ms = match self {
            WorkClass::Chat => config.chat_wait_timeout_ms,
            WorkClass::Ingestion => config.ingestion_wait_timeout_ms,
            WorkClass::Communities => config.communities_wait_timeout_ms,
        };
        Duration::from_millis(ms)
    }

    fn poll_interval(self) -> Duration {
        match self {
            WorkClass::Chat => Duration::from_millis(50),
            WorkClass::Ingestion => Duration::from_millis(200),
            WorkClass::Communities => Duration::from_millis(500),
        }
    }
}

/// A held capacity lease. Dropping it without calling
/// [`CapacityLimiter::release`] leaks the slot until its TTL expires —
/// callers should always release via [`CapacityLimiter::hold`].
#[derive(Debug, Clone)]
pub struct Lease {
    pub id: String,
    pub class: WorkClass,
}

pub struct CapacityLimiter {
    kv: Arc<dyn KV>,
    config: CapacityConfig,
    provider_key: String,
}

impl CapacityLimiter {
    #[must_use]
    pub fn new(kv: Arc<dyn KV>, config: CapacityConfig, provider_key: impl Into<String>) -> Self {
        Self {
            kv,
            config,
            provider_key: provider_key.into(),
        }
    }

    fn key(&self, class: WorkClass) -> String {
        format!("llm_capacity:{}:{}", self.provider_key, class.as_str())
    }

    /// Single attempt to acquire a lease; never blocks. On KV failure,
    /// fails open and returns a bypass lease (spec §4.8, §7: "Capacity-
    /// limiter backend failure fails open").
    pub async fn try_acquire(&self, class: WorkClass) -> Lease {
        let lease_id = uuid::Uuid::new_v4().to_string();
        let now_ms = chrono::Utc::now().timestamp_millis() as f64;
        let ttl_ms = (self.config.lease_ttl_seconds.max(1) * 1000) as f64;

        let keys = vec![self.key(WorkClass::Chat), self.key(WorkClass::Ingestion), self.key(WorkClass::Communities)];
        let args = vec![
            now_ms.to_string(),
            ttl_ms.to_string(),
            class.as_str().to_string(),
            self.config.total.to_string(),
            self.config.reserved_chat.to_string(),
            self.config.reserved_ingestion.to_string(),
            lease_id.clone(),
        ];

        match self.kv.eval_script("capacity_acquire", &keys, &args).await {
            Ok(raw) => {
                let allowed = serde_json::from_str::<serde_json::Value>(&raw)
                    .ok()
                    .and_then(|v| v.get("allowed").and_then(serde_json::Value::as_bool))
                    .unwrap_or(false);
                if allowed {
                    Lease { id: lease_id, class }
                } else {
                    Lease { id: String::new(), class }
                }
            }
            Err(err) => {
                warn!(error = %err, "capacity limiter bypass: kv unavailable");
                Lease { id: "bypass".to_string(), class }
            }
        }
    }

    fn lease_granted(lease: &Lease) -> bool {
        !lease.id.is_empty()
    }

    pub async fn release(&self, lease: &Lease) {
        if lease.id.is_empty() || lease.id == "bypass" {
            return;
        }
        let keys = vec![self.key(WorkClass::Chat), self.key(WorkClass::Ingestion), self.key(WorkClass::Communities)];
        if let Err(err) = self.kv.eval_script("capacity_release", &keys, std::slice::from_ref(&lease.id)).await {
            warn!(error = %err, lease_id = %lease.id, "capacity lease release failed, may leak until ttl expiry");
        }
    }

    /// Acquire a lease, waiting up to the class's timeout with
    /// class-dependent back-off, and release it when `body` finishes
    /// (spec §4.8: `hold(class)`).
    pub async fn hold<F, Fut, T>(&self, class: WorkClass, body: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let timeout = class.wait_timeout(&self.config);
        let deadline = Instant::now() + timeout;

        loop {
            let lease = self.try_acquire(class).await;
            if Self::lease_granted(&lease) {
                let result = body().await;
                self.release(&lease).await;
                return Ok(result);
            }

            if Instant::now() >= deadline {
                return Err(AmberError::ProviderUnavailable {
                    message: format!("llm capacity busy (class={:?}, total={})", class, self.config.total),
                });
            }

            tokio::time::sleep(class.poll_interval()).await;
        }
    }
}
