//! In-memory reference adapter for [`MemoryRepository`]. Grounded on
//! `original_source/src/core/generation/application/memory/manager.py`'s
//! `ConversationMemoryManager`: user facts ordered by confidence then
//! recency, summaries ordered by recency, both strictly tenant/user
//! scoped.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use amber_core::error::Result;
use amber_core::ports::MemoryRepository;
use amber_core::types::{ConversationSummary, UserFact};

#[derive(Default)]
struct TenantMemory {
    facts: Vec<UserFact>,
    summaries: HashMap<String, ConversationSummary>,
}

#[derive(Default)]
pub struct InMemoryMemoryStore {
    tenants: Mutex<HashMap<String, TenantMemory>>,
}

impl InMemoryMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryRepository for InMemoryMemoryStore {
    async fn add_user_fact(&self, fact: &UserFact) -> Result<()> {
        let mut tenants = self.tenants.lock();
        tenants.entry(fact.tenant_id.clone()).or_default().facts.push(fact.clone());
        Ok(())
    }

    async fn get_user_facts(&self, tenant_id: &str, user_id: &str, limit: usize) -> Result<Vec<UserFact>> {
        let tenants = self.tenants.lock();
        let Some(tenant) = tenants.get(tenant_id) else {
            return Ok(Vec::new());
        };

        let mut facts: Vec<UserFact> = tenant.facts.iter().filter(|f| f.user_id == user_id).cloned().collect();
        facts.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal).then(b.created_at.cmp(&a.created_at)));
        facts.truncate(limit);
        Ok(facts)
    }

    async fn delete_user_fact(&self, tenant_id: &str, fact_id: &str) -> Result<bool> {
        let mut tenants = self.tenants.lock();
        let Some(tenant) = tenants.get_mut(tenant_id) else {
            return Ok(false);
        };
        let before = tenant.facts.len();
        tenant.facts.retain(|f| f.id != fact_id);
        Ok(tenant.facts.len() != before)
    }

    async fn save_conversation_summary(&self, summary: &ConversationSummary) -> Result<()> {
        let mut tenants = self.tenants.lock();
        tenants.entry(summary.tenant_id.clone()).or_default().summaries.insert(summary.conversation_id.clone(), summary.clone());
        Ok(())
    }

    async fn get_recent_summaries(&self, tenant_id: &str, user_id: &str, limit: usize) -> Result<Vec<ConversationSummary>> {
        let tenants = self.tenants.lock();
        let Some(tenant) = tenants.get(tenant_id) else {
            return Ok(Vec::new());
        };

        let mut summaries: Vec<ConversationSummary> = tenant.summaries.values().filter(|s| s.user_id == user_id).cloned().collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }
}
