//! Chunk and chunk-level embedding status (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum chunk content length accepted by the vector store (spec §3, §4.5).
pub const MAX_CHUNK_CONTENT_CHARS: usize = 65_530;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    Pending,
    Completed,
    Failed,
}

/// A token-bounded window of document text (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub tenant_id: String,
    pub document_id: String,
    pub index: u32,
    pub content: String,
    pub tokens: usize,
    pub metadata: HashMap<String, serde_json::Value>,
    pub embedding_status: EmbeddingStatus,
}

impl Chunk {
    #[must_use]
    pub fn id_for(document_id: &str, index: u32) -> String {
        format!("{document_id}:{index}")
    }

    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        document_id: impl Into<String>,
        index: u32,
        content: impl Into<String>,
        tokens: usize,
    ) -> Self {
        let document_id = document_id.into();
        let id = Self::id_for(&document_id, index);
        Self {
            id,
            tenant_id: tenant_id.into(),
            document_id,
            index,
            content: content.into(),
            tokens,
            metadata: HashMap::new(),
            embedding_status: EmbeddingStatus::Pending,
        }
    }

    /// Truncate content to the vector store's stored-content limit
    /// (spec §3/§4.5: "Chunk content ≤ 65,530 characters stored in the
    /// vector store"). Truncation is performed at a UTF-8 char boundary.
    #[must_use]
    pub fn truncated_content(&self) -> &str {
        if self.content.chars().count() <= MAX_CHUNK_CONTENT_CHARS {
            return &self.content;
        }
        let mut end = self.content.len();
        let mut chars_seen = 0;
        for (idx, _) in self.content.char_indices() {
            if chars_seen == MAX_CHUNK_CONTENT_CHARS {
                end = idx;
                break;
            }
            chars_seen += 1;
        }
        &self.content[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_encodes_document_and_index() {
        let chunk = Chunk::new("t1", "doc1", 3, "hello", 1);
        assert_eq!(chunk.id, "doc1:3");
    }

    #[test]
    fn truncation_respects_utf8_boundaries() {
        let content: String = "é".repeat(MAX_CHUNK_CONTENT_CHARS + 10);
        let chunk = Chunk::new("t1", "doc1", 0, content, 10);
        let truncated = chunk.truncated_content();
        assert_eq!(truncated.chars().count(), MAX_CHUNK_CONTENT_CHARS);
        assert!(std::str::from_utf8(truncated.as_bytes()).is_ok());
    }

    #[test]
    fn short_content_is_not_truncated() {
        let chunk = Chunk::new("t1", "doc1", 0, "hi", 1);
        assert_eq!(chunk.truncated_content(), "hi");
    }
}
