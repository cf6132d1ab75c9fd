//! Prompt assembly, streaming generation, and layered memory (spec
//! §4.12, C12).

pub mod assembly;
pub mod memory;
pub mod pii;
pub mod service;
pub mod streaming;

pub use assembly::{AssembledPrompt, CitedChunk, PromptAssembler};
pub use memory::InMemoryMemoryStore;
pub use pii::scrub_pii;
pub use service::GenerationService;
pub use streaming::GenerationEvent;
