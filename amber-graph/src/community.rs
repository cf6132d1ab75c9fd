//! Lazy community recomputation (spec §4.4 "Community", SPEC_FULL §13
//! Open Question #3): ingestion only marks affected communities
//! `is_stale`; clustering and summarization happen here, as a
//! separate operation invoked by a community pass, not by ingestion
//! itself.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use amber_core::error::Result;
use amber_core::ports::{GenerateRequest, LLMProvider};
use amber_core::types::{Community, TRAVERSAL_EXCLUDED_RELATION_TYPES};

use crate::store::InMemoryGraphStore;

/// Union-find over entity names connected by non-structural relations.
struct UnionFind {
    parent: HashMap<String, String>,
}

impl UnionFind {
    fn new(names: impl Iterator<Item = String>) -> Self {
        Self { parent: names.map(|n| (n.clone(), n)).collect() }
    }

    fn find(&mut self, name: &str) -> String {
        let parent = self.parent.get(name).cloned().unwrap_or_else(|| name.to_string());
        if parent == name {
            return parent;
        }
        let root = self.find(&parent);
        self.parent.insert(name.to_string(), root.clone());
        root
    }

    fn union(&mut self, a: &str, b: &str) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent.insert(root_a, root_b);
        }
    }
}

/// Recomputes every community for `tenant_id` from the current graph
/// state: connected components of entities joined by non-structural
/// relations, summarized with `llm` when given, falling back to a
/// heuristic title built from the component's top entities. Returns
/// the number of communities written.
///
/// This recomputes from scratch rather than patching only
/// `is_stale` communities: connectivity can merge or split existing
/// clusters in ways that are hard to reconcile incrementally, and a
/// full recompute keeps the in-memory reference adapter simple.
pub async fn recompute_stale(store: &InMemoryGraphStore, tenant_id: &str, llm: Option<&Arc<dyn LLMProvider>>) -> Result<usize> {
    let entities = store.entities(tenant_id);
    if entities.is_empty() {
        return Ok(0);
    }

    let mut uf = UnionFind::new(entities.iter().map(|e| e.name.clone()));
    for relation in store.relations(tenant_id) {
        if TRAVERSAL_EXCLUDED_RELATION_TYPES.contains(&relation.relation_type.as_str()) {
            continue;
        }
        uf.union(&relation.source, &relation.target);
    }

    let mut clusters: HashMap<String, Vec<String>> = HashMap::new();
    for entity in &entities {
        let root = uf.find(&entity.name);
        clusters.entry(root).or_default().push(entity.name.clone());
    }

    let mut written = 0;
    for mut members in clusters.into_values() {
        members.sort();
        let id = cluster_id(tenant_id, &members);
        let (title, summary) = summarize(llm, &members).await;

        store.upsert_community(
            tenant_id,
            Community {
                id,
                tenant_id: tenant_id.to_string(),
                level: 0,
                title,
                summary,
                key_entities: members,
                rating: None,
                status: "active".to_string(),
                is_stale: false,
            },
        );
        written += 1;
    }

    info!(tenant_id, communities = written, "recomputed communities");
    Ok(written)
}

fn cluster_id(tenant_id: &str, members: &[String]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_bytes());
    for member in members {
        hasher.update(member.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("community-{}", &digest[..16])
}

async fn summarize(llm: Option<&Arc<dyn LLMProvider>>, members: &[String]) -> (String, String) {
    let heuristic_title = members.iter().take(3).cloned().collect::<Vec<_>>().join(", ");

    let Some(llm) = llm else {
        return (heuristic_title, format!("A cluster of {} related entities: {}", members.len(), members.join(", ")));
    };

    let prompt = format!(
        "Summarize the following cluster of related entities in one short sentence, then propose a title under 6 words. \
         Respond as JSON {{\"title\":str,\"summary\":str}}.\n\nEntities: {}",
        members.join(", ")
    );

    match llm.generate(GenerateRequest { prompt, temperature: 0.2, max_tokens: Some(200), ..Default::default() }).await {
        Ok(response) => parse_summary(&response.text).unwrap_or_else(|| (heuristic_title.clone(), response.text)),
        Err(_) => (heuristic_title, format!("A cluster of {} related entities: {}", members.len(), members.join(", "))),
    }
}

fn parse_summary(text: &str) -> Option<(String, String)> {
    let cleaned = text.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```").trim();
    let value: serde_json::Value = serde_json::from_str(cleaned).ok()?;
    let title = value.get("title")?.as_str()?.to_string();
    let summary = value.get("summary")?.as_str()?.to_string();
    Some((title, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ops;
    use amber_core::error::AmberError;
    use amber_core::ports::{GenerateResponse, GenerateStreamEvent, Usage};
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use serde_json::json;

    fn stmt(query: &str, params: serde_json::Value) -> amber_core::ports::GraphStatement {
        amber_core::ports::GraphStatement { query: query.to_string(), params }
    }

    #[tokio::test]
    async fn isolated_entities_form_singleton_communities() {
        let store = InMemoryGraphStore::new();
        store
            .execute_write(
                "t1",
                vec![
                    stmt(ops::MERGE_ENTITY, json!({"name": "Alpha", "entity_type": "ORG", "description": ""})),
                    stmt(ops::MERGE_ENTITY, json!({"name": "Beta", "entity_type": "ORG", "description": ""})),
                ],
            )
            .await
            .unwrap();

        let written = recompute_stale(&store, "t1", None).await.unwrap();
        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn connected_entities_form_one_community() {
        let store = InMemoryGraphStore::new();
        store
            .execute_write(
                "t1",
                vec![
                    stmt(ops::MERGE_ENTITY, json!({"name": "Alpha", "entity_type": "ORG", "description": ""})),
                    stmt(ops::MERGE_ENTITY, json!({"name": "Beta", "entity_type": "PERSON", "description": ""})),
                    stmt(ops::MERGE_RELATION, json!({"source": "Beta", "target": "Alpha", "relation_type": "WORKS_FOR"})),
                ],
            )
            .await
            .unwrap();

        let written = recompute_stale(&store, "t1", None).await.unwrap();
        assert_eq!(written, 1);
        let community = &store.communities("t1")[0];
        assert_eq!(community.key_entities.len(), 2);
        assert!(!community.is_stale);
    }

    #[tokio::test]
    async fn structural_relations_do_not_merge_communities() {
        let store = InMemoryGraphStore::new();
        store
            .execute_write(
                "t1",
                vec![
                    stmt(ops::MERGE_ENTITY, json!({"name": "Alpha", "entity_type": "ORG", "description": ""})),
                    stmt(ops::MERGE_ENTITY, json!({"name": "Beta", "entity_type": "ORG", "description": ""})),
                    stmt(ops::MERGE_RELATION, json!({"source": "Beta", "target": "Alpha", "relation_type": "BELONGS_TO"})),
                ],
            )
            .await
            .unwrap();

        let written = recompute_stale(&store, "t1", None).await.unwrap();
        assert_eq!(written, 2);
    }

    struct StubLlm;

    #[async_trait]
    impl LLMProvider for StubLlm {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
            Ok(GenerateResponse {
                text: r#"{"title":"Acme Leadership","summary":"Key people at Acme."}"#.to_string(),
                model: "stub".to_string(),
                provider: "stub".to_string(),
                usage: Usage::default(),
                finish_reason: "stop".to_string(),
                latency_ms: 0,
                cost_estimate: 0.0,
            })
        }

        async fn generate_stream(&self, _request: GenerateRequest) -> Result<BoxStream<'static, Result<GenerateStreamEvent>>> {
            Err(AmberError::internal("not used"))
        }
    }

    #[tokio::test]
    async fn llm_summary_is_used_when_parseable() {
        let store = InMemoryGraphStore::new();
        store
            .execute_write("t1", vec![stmt(ops::MERGE_ENTITY, json!({"name": "Alpha", "entity_type": "ORG", "description": ""}))])
            .await
            .unwrap();

        let llm: Arc<dyn LLMProvider> = Arc::new(StubLlm);
        recompute_stale(&store, "t1", Some(&llm)).await.unwrap();

        let community = &store.communities("t1")[0];
        assert_eq!(community.title, "Acme Leadership");
    }
}
