//! Object storage, vector store, graph store, and KV ports (spec §6).

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::Chunk;

/// Byte-blob storage for raw uploaded documents (spec §6).
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
    async fn get_bytes(&self, name: &str) -> Result<Vec<u8>>;
    async fn get_stream(&self, name: &str) -> Result<BoxStream<'static, Result<Vec<u8>>>>;
    async fn delete(&self, name: &str) -> Result<()>;
}

/// A single hit from a vector or hybrid search (spec §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk_id: String,
    pub document_id: String,
    pub tenant_id: String,
    pub score: f32,
    pub content: String,
}

/// Per-tenant dense/sparse chunk index (spec §4.5).
///
/// Every operation is tenant-scoped; implementations must AND a
/// tenant filter into every query regardless of caller-supplied
/// filters.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;

    async fn upsert(&self, tenant_id: &str, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    async fn search(
        &self,
        tenant_id: &str,
        query_vector: &[f32],
        document_ids: Option<&[String]>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorHit>>;

    /// Dense + sparse fused search. Implementations unable to honor a
    /// sparse component fall back to dense-only (spec §4.5).
    async fn hybrid_search(
        &self,
        tenant_id: &str,
        dense: &[f32],
        sparse: Option<&std::collections::HashMap<u32, f32>>,
        document_ids: Option<&[String]>,
        limit: usize,
    ) -> Result<Vec<VectorHit>>;

    async fn get_chunks(&self, tenant_id: &str, ids: &[String]) -> Result<Vec<VectorHit>>;

    async fn delete_by_document(&self, tenant_id: &str, document_id: &str) -> Result<()>;
    async fn delete_by_tenant(&self, tenant_id: &str) -> Result<()>;
}

/// A write statement against the property graph, executed inside a
/// single transactional block alongside its siblings (spec §6).
#[derive(Debug, Clone)]
pub struct GraphStatement {
    pub query: String,
    pub params: serde_json::Value,
}

/// A row returned from a graph read, keyed by the query's return aliases.
pub type GraphRow = std::collections::HashMap<String, serde_json::Value>;

/// Typed property-graph access with MERGE semantics (spec §6).
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn execute_read(&self, tenant_id: &str, statement: GraphStatement) -> Result<Vec<GraphRow>>;

    /// Execute all statements transactionally: either every statement in
    /// `statements` applies, or none do.
    async fn execute_write(&self, tenant_id: &str, statements: Vec<GraphStatement>) -> Result<()>;
}

/// Minimal Redis-shaped KV port: string get/setex, sorted sets for
/// sliding-window counters, Lua-equivalent atomic scripts, and pub/sub
/// (spec §6, §4.8, §4.9).
#[async_trait]
pub trait KV: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn setex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()>;
    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<u64>;
    async fn zcard(&self, key: &str) -> Result<u64>;

    /// Execute a named atomic script (implementations map this to a Lua
    /// script or an in-process mutex-guarded closure); `keys` and `args`
    /// follow Redis `EVAL` calling conventions.
    async fn eval_script(&self, script_name: &str, keys: &[String], args: &[String]) -> Result<String>;

    async fn publish(&self, channel: &str, payload: &str) -> Result<()>;
}
