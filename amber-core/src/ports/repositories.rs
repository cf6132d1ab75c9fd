//! Relational-style repository ports (spec §6).

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::Result;
use crate::types::{Chunk, ConversationSummary, Document, DocumentStatus, Tenant, UserFact};

/// CRUD + optimistic-CAS access to documents (spec §6, §4.1).
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn get(&self, tenant_id: &str, document_id: &str) -> Result<Option<Document>>;
    async fn save(&self, document: &Document) -> Result<()>;

    /// Advance `document_id` from `expected` to `next` atomically. Returns
    /// `Ok(false)` on CAS mismatch rather than an error, since losing a
    /// race is an expected outcome for concurrent pipeline workers.
    async fn advance_if_in_state(
        &self,
        tenant_id: &str,
        document_id: &str,
        expected: DocumentStatus,
        next: DocumentStatus,
    ) -> Result<bool>;

    async fn mark_failed(&self, tenant_id: &str, document_id: &str, error_message: &str) -> Result<()>;

    async fn find_by_content_hash(&self, tenant_id: &str, content_hash: &str) -> Result<Option<Document>>;
}

/// Bulk chunk access (spec §6).
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    async fn insert_batch(&self, chunks: &[Chunk]) -> Result<()>;
    async fn get_by_ids(&self, tenant_id: &str, ids: &[String]) -> Result<Vec<Chunk>>;
    async fn get_by_document(&self, tenant_id: &str, document_id: &str) -> Result<Vec<Chunk>>;
    async fn delete_by_document(&self, tenant_id: &str, document_id: &str) -> Result<()>;
}

/// Tenant lookup and config mutation (spec §6).
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn get(&self, tenant_id: &str) -> Result<Option<Tenant>>;
    async fn update_config(&self, tenant_id: &str, patch: HashMap<String, Value>) -> Result<Tenant>;
    async fn last_update_ts(&self, tenant_id: &str) -> Result<chrono::DateTime<chrono::Utc>>;
}

/// Durable user facts and conversation summaries, scoped by
/// `(tenant_id, user_id)` (spec §4.12's layered memory, supplemented
/// from `original_source/src/core/generation/application/memory/manager.py`).
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    async fn add_user_fact(&self, fact: &UserFact) -> Result<()>;
    async fn get_user_facts(&self, tenant_id: &str, user_id: &str, limit: usize) -> Result<Vec<UserFact>>;
    async fn delete_user_fact(&self, tenant_id: &str, fact_id: &str) -> Result<bool>;

    async fn save_conversation_summary(&self, summary: &ConversationSummary) -> Result<()>;
    async fn get_recent_summaries(&self, tenant_id: &str, user_id: &str, limit: usize) -> Result<Vec<ConversationSummary>>;
}
