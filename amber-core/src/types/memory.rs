//! User-scoped memory: durable facts and conversation summaries (spec §3).

use serde::{Deserialize, Serialize};

/// A durable fact extracted from conversation, scoped by `(tenant_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserFact {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub content: String,
    pub confidence: f32,
    pub source_conversation_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl UserFact {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            content: content.into(),
            confidence: 1.0,
            source_conversation_id: None,
            created_at: chrono::Utc::now(),
        }
    }
}

/// A rolling summary of a conversation, scoped by `(tenant_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub summary: String,
    pub message_count: u32,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
