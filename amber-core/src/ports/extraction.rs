//! Content extraction port (spec §6).

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

/// Result of extracting text content from an uploaded file.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub extractor_used: String,
    pub confidence: f32,
    pub extraction_time_ms: u64,
}

/// Pulls plain text out of an arbitrary uploaded file (spec §6, §4.2).
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], mime_type: &str, filename: &str) -> Result<ExtractedContent>;
}
