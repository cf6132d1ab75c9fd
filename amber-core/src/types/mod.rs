//! Core data model shared across all Amber crates (spec §3).

mod cache;
mod chunk;
mod document;
mod embedding;
mod graph;
mod memory;
mod tenant;

pub use cache::CachedResult;
pub use chunk::{Chunk, EmbeddingStatus, MAX_CHUNK_CONTENT_CHARS};
pub use document::{Document, DocumentStatus};
pub use embedding::{cosine_similarity, DenseEmbedding, SparseEmbedding, SparseEmbeddingOutcome};
pub use graph::{
    sanitize_relation_type, Community, Entity, Relation, DEFAULT_RELATION_TYPE,
    TRAVERSAL_EXCLUDED_RELATION_TYPES,
};
pub use memory::{ConversationSummary, UserFact};
pub use tenant::Tenant;
