//! Graph Builder and in-memory property-graph reference adapter
//! (spec §4.4, C4).

pub mod builder;
pub mod community;
pub mod extraction;
pub mod similarity;
pub mod store;

pub use builder::{DefaultGraphBuilder, GraphBuildConfig, GraphBuilder};
pub use community::recompute_stale;
pub use extraction::{EntityExtractor, ExtractedEntity, ExtractedRelation, ExtractionResult, LlmEntityExtractor, RegexEntityExtractor};
pub use similarity::{top_k_similarity_edges, SimilarityEdge};
pub use store::InMemoryGraphStore;
