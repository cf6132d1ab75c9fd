//! Port traits implemented by infrastructure adapters elsewhere in the
//! workspace (spec §6). `amber-core` defines the contracts only; no
//! concrete adapter lives in this crate.

mod extraction;
mod provider;
mod repositories;
mod storage;

pub use extraction::{ContentExtractor, ExtractedContent};
pub use provider::{
    ChatMessage, EmbedResponse, EmbeddingProvider, GenerateRequest, GenerateResponse,
    GenerateStreamEvent, LLMProvider, RerankHit, RerankerProvider, Usage,
};
pub use repositories::{ChunkRepository, DocumentRepository, MemoryRepository, TenantRepository};
pub use storage::{GraphRow, GraphStatement, GraphStore, KV, ObjectStorage, VectorHit, VectorStore};
