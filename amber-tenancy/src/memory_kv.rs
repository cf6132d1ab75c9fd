//! In-process reference implementation of [`KV`] (spec §6).
//!
//! The real deployment target is Redis; implementing it is a Non-goal
//! (ports only). This adapter gives the capacity limiter, rate limiter,
//! and caches something to run against in tests and in single-process
//! deployments, with the same atomic-script contract a Redis `EVAL`
//! would provide.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use amber_core::error::{AmberError, Result};
use amber_core::ports::KV;

struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct Store {
    strings: HashMap<String, StringEntry>,
    /// member -> score, per sorted-set key.
    sorted_sets: HashMap<String, BTreeMap<String, f64>>,
}

pub struct InMemoryKv {
    store: Mutex<Store>,
}

impl InMemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
        }
    }

    fn evict_expired(set: &mut BTreeMap<String, f64>, min: f64, max: f64) -> u64 {
        let to_remove: Vec<String> = set
            .iter()
            .filter(|(_, score)| **score >= min && **score <= max)
            .map(|(member, _)| member.clone())
            .collect();
        for member in &to_remove {
            set.remove(member);
        }
        to_remove.len() as u64
    }

    fn eval_capacity_acquire(&self, keys: &[String], args: &[String]) -> Result<String> {
        let [chat_key, ingestion_key, communities_key] = keys else {
            return Err(AmberError::internal("capacity_acquire requires 3 keys"));
        };
        let now_ms: f64 = parse_arg(args, 0)?;
        let ttl_ms: f64 = parse_arg(args, 1)?;
        let work_class: &str = args.get(2).map(String::as_str).unwrap_or("");
        let total: i64 = parse_arg(args, 3)?;
        let reserved_chat: i64 = parse_arg(args, 4)?;
        let reserved_ingestion: i64 = parse_arg(args, 5)?;
        let lease_id: &str = args.get(6).map(String::as_str).unwrap_or("");

        let mut store = self.store.lock();
        for key in [chat_key, ingestion_key, communities_key] {
            let set = store.sorted_sets.entry(key.clone()).or_default();
            Self::evict_expired(set, f64::MIN, now_ms);
        }

        let chat_n = store.sorted_sets.get(chat_key).map_or(0, BTreeMap::len) as i64;
        let ing_n = store.sorted_sets.get(ingestion_key).map_or(0, BTreeMap::len) as i64;
        let com_n = store.sorted_sets.get(communities_key).map_or(0, BTreeMap::len) as i64;

        let total_n = chat_n + ing_n + com_n;
        let non_chat_n = ing_n + com_n;
        let non_chat_max = (total - reserved_chat).max(0);
        let communities_max = (total - reserved_chat - reserved_ingestion).max(0);

        let allowed = match work_class {
            "chat" => total_n < total,
            "ingestion" => total_n < total && non_chat_n < non_chat_max,
            "communities" => total_n < total && non_chat_n < non_chat_max && com_n < communities_max,
            _ => total_n < total,
        };

        if allowed {
            let key = match work_class {
                "chat" => chat_key,
                "ingestion" => ingestion_key,
                _ => communities_key,
            };
            store
                .sorted_sets
                .entry(key.clone())
                .or_default()
                .insert(lease_id.to_string(), now_ms + ttl_ms);
        }

        Ok(serde_json::json!({ "allowed": allowed }).to_string())
    }

    fn eval_capacity_release(&self, keys: &[String], args: &[String]) -> Result<String> {
        let lease_id = args.first().map(String::as_str).unwrap_or("");
        let mut store = self.store.lock();
        for key in keys {
            if let Some(set) = store.sorted_sets.get_mut(key) {
                set.remove(lease_id);
            }
        }
        Ok(String::new())
    }

    fn eval_rate_limit_check(&self, keys: &[String], args: &[String]) -> Result<String> {
        let key = keys.first().ok_or_else(|| AmberError::internal("rate_limit_check requires 1 key"))?;
        let now_s: f64 = parse_arg(args, 0)?;
        let window_s: f64 = parse_arg(args, 1)?;
        let limit: i64 = parse_arg(args, 2)?;

        let mut store = self.store.lock();
        let set = store.sorted_sets.entry(key.clone()).or_default();
        Self::evict_expired(set, f64::MIN, now_s - window_s);

        let count = set.len() as i64;
        let oldest = set.values().fold(f64::MAX, |acc, score| acc.min(*score));

        if count >= limit {
            let retry_after = if oldest.is_finite() {
                ((oldest + window_s) - now_s).max(0.0)
            } else {
                window_s
            };
            return Ok(serde_json::json!({
                "allowed": false,
                "remaining": 0,
                "retry_after": retry_after,
            })
            .to_string());
        }

        set.insert(uuid::Uuid::new_v4().to_string(), now_s);
        Ok(serde_json::json!({
            "allowed": true,
            "remaining": (limit - count - 1).max(0),
            "retry_after": serde_json::Value::Null,
        })
        .to_string())
    }
}

fn parse_arg<T: std::str::FromStr>(args: &[String], index: usize) -> Result<T> {
    args.get(index)
        .ok_or_else(|| AmberError::internal(format!("missing script arg at index {index}")))?
        .parse()
        .map_err(|_| AmberError::internal(format!("unparseable script arg at index {index}")))
}

impl Default for InMemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KV for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut store = self.store.lock();
        if let Some(entry) = store.strings.get(key) {
            if entry.expires_at.is_some_and(|at| Instant::now() >= at) {
                store.strings.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn setex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<()> {
        let mut store = self.store.lock();
        store.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds)),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.store.lock().strings.remove(key);
        Ok(())
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()> {
        self.store
            .lock()
            .sorted_sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<u64> {
        let mut store = self.store.lock();
        let set = store.sorted_sets.entry(key.to_string()).or_default();
        Ok(Self::evict_expired(set, min, max))
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        Ok(self.store.lock().sorted_sets.get(key).map_or(0, BTreeMap::len) as u64)
    }

    async fn eval_script(&self, script_name: &str, keys: &[String], args: &[String]) -> Result<String> {
        match script_name {
            "capacity_acquire" => self.eval_capacity_acquire(keys, args),
            "capacity_release" => self.eval_capacity_release(keys, args),
            "rate_limit_check" => self.eval_rate_limit_check(keys, args),
            other => Err(AmberError::internal(format!("unknown script: {other}"))),
        }
    }

    async fn publish(&self, _channel: &str, _payload: &str) -> Result<()> {
        Ok(())
    }
}
