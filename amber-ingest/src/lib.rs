//! Document ingestion pipeline: CAS-driven state machine orchestration,
//! semantic chunking, and batched embedding (spec §4.2-§4.3, C2-C3).

pub mod batching;
pub mod chunking;
pub mod classification;
pub mod embedding;
pub mod orchestrator;

pub use chunking::{approx_token_count, config_for_domain, ChunkedText, ChunkingConfig, ChunkingStrategy, SlidingWindowChunker};
pub use classification::DomainClassifier;
pub use embedding::{Embedder, EmbedderConfig};
pub use orchestrator::IngestionOrchestrator;
