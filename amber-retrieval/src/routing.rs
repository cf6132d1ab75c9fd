//! Search mode routing (spec §4.6 step 3). Grounded on
//! `llmspell-context/src/query/analyzer.rs`'s regex-based, early-exit
//! intent classification style.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchMode {
    Basic,
    Hybrid,
    Global,
    Drift,
}

static GLOBAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(overall|across (?:all|the)|summarize (?:the|all)|main themes|big picture)\b").unwrap());
static DRIFT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(explore|related to|drill (?:down|into)|branch(?:es|ing)?)\b").unwrap());
static ENTITY_LIKE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z][a-zA-Z0-9]+(?:\s+[A-Z][a-zA-Z0-9]+)*\b").unwrap());

/// Heuristic mode router, tried before falling back to `Basic` (spec
/// §4.6 step 3: "heuristics and/or an LLM classifier"; no LLM
/// classifier is wired here — a caller-supplied override always wins
/// via `route`'s `explicit_override` parameter, which is the hook a
/// classifier would use too).
#[must_use]
pub fn route(query: &str, explicit_override: Option<SearchMode>) -> SearchMode {
    if let Some(mode) = explicit_override {
        return mode;
    }

    if GLOBAL_PATTERN.is_match(query) {
        return SearchMode::Global;
    }
    if DRIFT_PATTERN.is_match(query) {
        return SearchMode::Drift;
    }
    if ENTITY_LIKE_PATTERN.is_match(query) {
        return SearchMode::Hybrid;
    }
    SearchMode::Basic
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_override_always_wins() {
        assert_eq!(route("across all documents", Some(SearchMode::Basic)), SearchMode::Basic);
    }

    #[test]
    fn global_keywords_route_to_global() {
        assert_eq!(route("summarize the main themes across all documents", None), SearchMode::Global);
    }

    #[test]
    fn drift_keywords_route_to_drift() {
        assert_eq!(route("explore topics related to onboarding", None), SearchMode::Drift);
    }

    #[test]
    fn capitalized_entity_like_tokens_route_to_hybrid() {
        assert_eq!(route("what did Acme Corp ship last quarter", None), SearchMode::Hybrid);
    }

    #[test]
    fn plain_lowercase_query_falls_back_to_basic() {
        assert_eq!(route("what is the refund policy", None), SearchMode::Basic);
    }
}
