//! Streaming generation event shape (spec §4.12, §6): a `sources`
//! event first, then a sequence of `token` events, then one `done`
//! event carrying follow-ups. Grounded on
//! `llmspell-core/src/types/streaming.rs`'s `AgentStream`/`AgentChunk`
//! boxed-stream shape, specialized to this fixed three-phase sequence
//! rather than a general chunk enum.

use crate::assembly::CitedChunk;

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    Sources(Vec<CitedChunk>),
    Token(String),
    Done { text: String, follow_ups: Vec<String> },
}
