//! Document and its lifecycle state machine (spec §3, §4.1).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// The document lifecycle state machine (spec §4.1).
///
/// Transitions are monotonic and advance only via
/// [`crate::ports::DocumentRepository::advance_if_in_state`]. `Ready`
/// and `Failed` are terminal and observable to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Ingested,
    Extracting,
    Classifying,
    Chunking,
    Embedding,
    GraphSync,
    Ready,
    Failed,
}

impl DocumentStatus {
    /// The single valid next state in the happy-path pipeline, or `None`
    /// for terminal states. `Failed` is reachable from any non-terminal
    /// state but is not modeled here since it is a fatal-error
    /// transition rather than a pipeline advance.
    #[must_use]
    pub fn next(self) -> Option<DocumentStatus> {
        match self {
            DocumentStatus::Ingested => Some(DocumentStatus::Extracting),
            DocumentStatus::Extracting => Some(DocumentStatus::Classifying),
            DocumentStatus::Classifying => Some(DocumentStatus::Chunking),
            DocumentStatus::Chunking => Some(DocumentStatus::Embedding),
            DocumentStatus::Embedding => Some(DocumentStatus::GraphSync),
            DocumentStatus::GraphSync => Some(DocumentStatus::Ready),
            DocumentStatus::Ready | DocumentStatus::Failed => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Ready | DocumentStatus::Failed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Ingested => "ingested",
            DocumentStatus::Extracting => "extracting",
            DocumentStatus::Classifying => "classifying",
            DocumentStatus::Chunking => "chunking",
            DocumentStatus::Embedding => "embedding",
            DocumentStatus::GraphSync => "graph_sync",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Failed => "failed",
        }
    }
}

/// A logical unit of ingested content (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub tenant_id: String,
    pub filename: String,
    pub content_hash: String,
    pub storage_path: String,
    pub status: DocumentStatus,
    pub domain: Option<String>,
    pub summary: Option<String>,
    pub document_type: Option<String>,
    pub keywords: Vec<String>,
    pub hashtags: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// SHA-256 of raw file bytes, hex-encoded. Used as the dedup key
    /// within `(tenant_id, content_hash)` (spec §3 invariant).
    #[must_use]
    pub fn hash_bytes(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    #[must_use]
    pub fn storage_path_for(tenant_id: &str, document_id: &str, filename: &str) -> String {
        format!("{tenant_id}/{document_id}/{filename}")
    }
}
