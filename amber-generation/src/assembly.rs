//! Prompt assembly for the generation service (spec §4.12). Grounded
//! on `llmspell-context/src/assembly/assembler.rs`'s `ContextAssembler`:
//! same token-budget enforcement strategy (4 chars ≈ 1 token, drop
//! trailing items once the budget is exceeded), generalized from
//! "ranked memory chunks" to the ordered prompt sections the spec
//! names.

use amber_core::types::{ConversationSummary, UserFact};

/// One retrieved chunk carrying the citation index the model is asked
/// to reference (spec §4.12: "retrieved chunks with stable citation
/// indices"). Citation indices are assigned by the caller (the
/// retrieval-to-generation boundary) and kept stable across a
/// streamed response.
#[derive(Debug, Clone, PartialEq)]
pub struct CitedChunk {
    pub index: usize,
    pub document_id: String,
    pub content: String,
}

/// The fully assembled prompt plus the citations actually included
/// after token-budget enforcement (spec §4.12, §6 "sources" event).
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub text: String,
    pub token_count: usize,
    pub citations: Vec<CitedChunk>,
}

pub struct PromptAssembler {
    token_budget: usize,
}

impl PromptAssembler {
    #[must_use]
    pub fn new(token_budget: usize) -> Self {
        Self { token_budget }
    }

    /// Assembles `[system rules] + [user facts] + [recent conversation
    /// summaries] + [retrieved chunks] + [user query]` (spec §4.12),
    /// truncating chunks from the end (lowest-ranked first, assuming
    /// callers pass them in descending relevance order) until the
    /// whole prompt fits the token budget.
    #[must_use]
    pub fn assemble(
        &self,
        system_rules: &str,
        user_facts: &[UserFact],
        recent_summaries: &[ConversationSummary],
        chunks: Vec<CitedChunk>,
        query: &str,
    ) -> AssembledPrompt {
        let header = Self::render_header(system_rules, user_facts, recent_summaries);
        let header_tokens = Self::estimate_tokens(&header);
        let query_section = format!("\n\nUser query:\n{query}");
        let query_tokens = Self::estimate_tokens(&query_section);

        let mut budget_remaining = self.token_budget.saturating_sub(header_tokens + query_tokens);
        let mut included = Vec::new();
        for chunk in chunks {
            let rendered = Self::render_chunk(&chunk);
            let chunk_tokens = Self::estimate_tokens(&rendered);
            if chunk_tokens > budget_remaining {
                break;
            }
            budget_remaining -= chunk_tokens;
            included.push((chunk, rendered));
        }

        let chunks_section = included.iter().map(|(_, rendered)| rendered.as_str()).collect::<Vec<_>>().join("\n\n");
        let text = format!("{header}\n\nRetrieved context:\n{chunks_section}{query_section}");
        let token_count = Self::estimate_tokens(&text);
        let citations = included.into_iter().map(|(chunk, _)| chunk).collect();

        AssembledPrompt { text, token_count, citations }
    }

    fn render_header(system_rules: &str, user_facts: &[UserFact], recent_summaries: &[ConversationSummary]) -> String {
        let mut sections = vec![format!("System rules:\n{system_rules}")];

        if !user_facts.is_empty() {
            let facts = user_facts.iter().map(|f| format!("- {}", f.content)).collect::<Vec<_>>().join("\n");
            sections.push(format!("Known facts about the user:\n{facts}"));
        }

        if !recent_summaries.is_empty() {
            let summaries = recent_summaries.iter().map(|s| format!("- {}", s.summary)).collect::<Vec<_>>().join("\n");
            sections.push(format!("Recent conversation summaries:\n{summaries}"));
        }

        sections.join("\n\n")
    }

    fn render_chunk(chunk: &CitedChunk) -> String {
        format!("[{}] {}", chunk.index, chunk.content)
    }

    #[must_use]
    const fn estimate_tokens(text: &str) -> usize {
        text.len().div_ceil(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, content: &str) -> CitedChunk {
        CitedChunk { index, document_id: "d1".to_string(), content: content.to_string() }
    }

    #[test]
    fn assembles_all_sections_in_order() {
        let assembler = PromptAssembler::new(8000);
        let fact = UserFact::new("f1", "t1", "u1", "prefers concise answers");
        let summary = ConversationSummary {
            conversation_id: "c1".to_string(),
            tenant_id: "t1".to_string(),
            user_id: "u1".to_string(),
            summary: "discussed refund policy last week".to_string(),
            message_count: 4,
            updated_at: chrono::Utc::now(),
        };

        let prompt = assembler.assemble("Be helpful.", &[fact], &[summary], vec![chunk(0, "refunds take 5 days")], "what is the refund window?");

        assert!(prompt.text.contains("Be helpful."));
        assert!(prompt.text.contains("prefers concise answers"));
        assert!(prompt.text.contains("discussed refund policy last week"));
        assert!(prompt.text.contains("[0] refunds take 5 days"));
        assert!(prompt.text.contains("what is the refund window?"));
        assert_eq!(prompt.citations.len(), 1);
    }

    #[test]
    fn drops_trailing_chunks_once_budget_is_exceeded() {
        let assembler = PromptAssembler::new(40);
        let chunks = vec![chunk(0, &"a".repeat(50)), chunk(1, &"b".repeat(50))];

        let prompt = assembler.assemble("rules", &[], &[], chunks, "q");

        assert!(prompt.citations.len() < 2);
    }

    #[test]
    fn empty_facts_and_summaries_omit_their_sections() {
        let assembler = PromptAssembler::new(8000);
        let prompt = assembler.assemble("rules", &[], &[], vec![], "q");

        assert!(!prompt.text.contains("Known facts"));
        assert!(!prompt.text.contains("Recent conversation summaries"));
    }
}
