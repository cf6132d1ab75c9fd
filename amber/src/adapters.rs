//! In-memory reference adapters for the four ports no other crate owns
//! (`DocumentRepository`, `ChunkRepository`, `TenantRepository`,
//! `ObjectStorage`). Grounded on the equivalent test doubles in
//! `amber-ingest/src/orchestrator.rs`'s `#[cfg(test)]` module, promoted
//! to real exported types since the composition root is the natural
//! owner of these four ports (nothing else in the workspace needs
//! them outside of tests).

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use serde_json::Value;

use amber_core::error::{AmberError, Result};
use amber_core::ports::{ChunkRepository, DocumentRepository, ObjectStorage, TenantRepository};
use amber_core::types::{Chunk, Document, DocumentStatus, Tenant};

#[derive(Default)]
pub struct InMemoryDocumentStore {
    by_id: Mutex<HashMap<(String, String), Document>>,
    by_hash: Mutex<HashMap<(String, String), Document>>,
}

impl InMemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentStore {
    async fn get(&self, tenant_id: &str, document_id: &str) -> Result<Option<Document>> {
        Ok(self.by_id.lock().get(&(tenant_id.to_string(), document_id.to_string())).cloned())
    }

    async fn save(&self, document: &Document) -> Result<()> {
        self.by_id.lock().insert((document.tenant_id.clone(), document.id.clone()), document.clone());
        self.by_hash
            .lock()
            .insert((document.tenant_id.clone(), document.content_hash.clone()), document.clone());
        Ok(())
    }

    async fn advance_if_in_state(
        &self,
        tenant_id: &str,
        document_id: &str,
        expected: DocumentStatus,
        next: DocumentStatus,
    ) -> Result<bool> {
        let mut docs = self.by_id.lock();
        if let Some(doc) = docs.get_mut(&(tenant_id.to_string(), document_id.to_string())) {
            if doc.status == expected {
                doc.status = next;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn mark_failed(&self, tenant_id: &str, document_id: &str, error_message: &str) -> Result<()> {
        if let Some(doc) = self.by_id.lock().get_mut(&(tenant_id.to_string(), document_id.to_string())) {
            doc.status = DocumentStatus::Failed;
            doc.error_message = Some(error_message.to_string());
        }
        Ok(())
    }

    async fn find_by_content_hash(&self, tenant_id: &str, content_hash: &str) -> Result<Option<Document>> {
        Ok(self.by_hash.lock().get(&(tenant_id.to_string(), content_hash.to_string())).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryChunkStore {
    store: Mutex<HashMap<String, Chunk>>,
}

impl InMemoryChunkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkRepository for InMemoryChunkStore {
    async fn insert_batch(&self, chunks: &[Chunk]) -> Result<()> {
        let mut store = self.store.lock();
        for chunk in chunks {
            store.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn get_by_ids(&self, _tenant_id: &str, ids: &[String]) -> Result<Vec<Chunk>> {
        let store = self.store.lock();
        Ok(ids.iter().filter_map(|id| store.get(id).cloned()).collect())
    }

    async fn get_by_document(&self, _tenant_id: &str, document_id: &str) -> Result<Vec<Chunk>> {
        let store = self.store.lock();
        Ok(store.values().filter(|c| c.document_id == document_id).cloned().collect())
    }

    async fn delete_by_document(&self, _tenant_id: &str, document_id: &str) -> Result<()> {
        self.store.lock().retain(|_, c| c.document_id != document_id);
        Ok(())
    }
}

/// Tenants are created lazily on first `get`: the composition root has
/// no separate tenant-provisioning flow in scope, so any tenant id a
/// caller names is treated as already active (spec §3's isolation
/// boundary, without the admin-CRUD surface that would create one).
#[derive(Default)]
pub struct InMemoryTenantStore {
    tenants: Mutex<HashMap<String, Tenant>>,
    last_update: Mutex<HashMap<String, chrono::DateTime<chrono::Utc>>>,
}

impl InMemoryTenantStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&self, tenant_id: &str) {
        self.last_update.lock().insert(tenant_id.to_string(), chrono::Utc::now());
    }
}

#[async_trait]
impl TenantRepository for InMemoryTenantStore {
    async fn get(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        let mut tenants = self.tenants.lock();
        let tenant = tenants.entry(tenant_id.to_string()).or_insert_with(|| Tenant::new(tenant_id, tenant_id)).clone();
        drop(tenants);
        if !self.last_update.lock().contains_key(tenant_id) {
            self.touch(tenant_id);
        }
        Ok(Some(tenant))
    }

    async fn update_config(&self, tenant_id: &str, patch: HashMap<String, Value>) -> Result<Tenant> {
        let mut tenants = self.tenants.lock();
        let tenant = tenants.entry(tenant_id.to_string()).or_insert_with(|| Tenant::new(tenant_id, tenant_id));
        tenant.config.extend(patch);
        let updated = tenant.clone();
        drop(tenants);
        self.touch(tenant_id);
        Ok(updated)
    }

    async fn last_update_ts(&self, tenant_id: &str) -> Result<chrono::DateTime<chrono::Utc>> {
        if let Some(ts) = self.last_update.lock().get(tenant_id) {
            return Ok(*ts);
        }
        self.touch(tenant_id);
        Ok(self.last_update.lock()[tenant_id])
    }
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    store: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStore {
    async fn upload(&self, name: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        self.store.lock().insert(name.to_string(), bytes);
        Ok(())
    }

    async fn get_bytes(&self, name: &str) -> Result<Vec<u8>> {
        self.store.lock().get(name).cloned().ok_or_else(|| AmberError::not_found(format!("object {name} not found")))
    }

    async fn get_stream(&self, name: &str) -> Result<BoxStream<'static, Result<Vec<u8>>>> {
        let bytes = self.get_bytes(name).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(bytes) })))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.store.lock().remove(name);
        Ok(())
    }
}

/// Shared plumbing the composition root needs that is not itself a
/// port: a monotonic request id for usage-log/error-body attribution.
#[must_use]
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
