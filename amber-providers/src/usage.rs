//! Durable usage accounting (spec §4.7: "every call records ... to a
//! durable usage log").

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use amber_core::ports::Usage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLogRow {
    pub tenant_id: String,
    pub operation: String,
    pub provider: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cost_estimate: f64,
    pub request_id: String,
    pub trace_id: Option<String>,
    /// Free-form attribution (spec §4.7: "records carry metadata"),
    /// e.g. `{"document_id": "..."}` for ingestion-triggered calls.
    pub metadata: HashMap<String, Value>,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// In-process usage log sink. The real deployment target is a durable
/// table; persistence is supplied by whatever `amber` wires in at
/// composition time, this just accumulates rows for inspection/testing.
pub struct UsageLog {
    rows: Mutex<Vec<UsageLogRow>>,
}

impl UsageLog {
    #[must_use]
    pub fn new() -> Self {
        Self { rows: Mutex::new(Vec::new()) }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        tenant_id: &str,
        operation: &str,
        provider: &str,
        model: &str,
        usage: Usage,
        cost_estimate: f64,
        request_id: &str,
        trace_id: Option<&str>,
        metadata: HashMap<String, Value>,
    ) {
        self.rows.lock().push(UsageLogRow {
            tenant_id: tenant_id.to_string(),
            operation: operation.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            tokens_in: usage.tokens_in,
            tokens_out: usage.tokens_out,
            cost_estimate,
            request_id: request_id.to_string(),
            trace_id: trace_id.map(str::to_string),
            metadata,
            recorded_at: chrono::Utc::now(),
        });
    }

    #[must_use]
    pub fn rows(&self) -> Vec<UsageLogRow> {
        self.rows.lock().clone()
    }

    #[must_use]
    pub fn total_cost_for_tenant(&self, tenant_id: &str) -> f64 {
        self.rows.lock().iter().filter(|r| r.tenant_id == tenant_id).map(|r| r.cost_estimate).sum()
    }

    /// Sums cost across every row whose `metadata.document_id` matches
    /// (spec §8: per-document cost attribution).
    #[must_use]
    pub fn compute_document_cost(&self, document_id: &str) -> f64 {
        self.rows
            .lock()
            .iter()
            .filter(|r| r.metadata.get("document_id").and_then(Value::as_str) == Some(document_id))
            .map(|r| r.cost_estimate)
            .sum()
    }
}

impl Default for UsageLog {
    fn default() -> Self {
        Self::new()
    }
}
