//! In-memory graph store for tests and ephemeral runs

use super::traits::{GraphStore, StoreError, StoreResult};
use crate::graph::{EdgeId, Entity, EntityKey, EntityType, RelationKind, Relationship};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// DashMap-backed store with the same uniqueness guarantees as the
/// SQLite backend.
///
/// Writes take a single internal mutex so the check-then-commit of the
/// uniqueness invariants is atomic; reads stay lock-free. Index entries
/// are never removed: identities are stable and external identifiers
/// are append-only.
#[derive(Default)]
pub struct MemoryStore {
    entities: DashMap<EntityKey, Entity>,
    by_identity: DashMap<(EntityType, String), EntityKey>,
    by_external: DashMap<(String, String), EntityKey>,
    edges: DashMap<EdgeId, Relationship>,
    edge_index: DashMap<(EntityKey, EntityKey, RelationKind), EdgeId>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entities
    pub fn node_count(&self) -> usize {
        self.entities.len()
    }

    /// Total number of relationships
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Fetch an entity by key
    pub fn node(&self, key: &EntityKey) -> Option<Entity> {
        self.entities.get(key).map(|e| e.clone())
    }

    /// Fetch a relationship by id
    pub fn edge(&self, id: &EdgeId) -> Option<Relationship> {
        self.edges.get(id).map(|r| r.clone())
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn find_node(
        &self,
        entity_type: EntityType,
        canonical_name: &str,
    ) -> StoreResult<Option<Entity>> {
        let key = self
            .by_identity
            .get(&(entity_type, canonical_name.to_string()))
            .map(|k| *k);
        Ok(key.and_then(|k| self.entities.get(&k).map(|e| e.clone())))
    }

    async fn find_node_by_external_id(
        &self,
        namespace: &str,
        id: &str,
    ) -> StoreResult<Option<Entity>> {
        let key = self
            .by_external
            .get(&(namespace.to_string(), id.to_string()))
            .map(|k| *k);
        Ok(key.and_then(|k| self.entities.get(&k).map(|e| e.clone())))
    }

    async fn find_edge(
        &self,
        source: &EntityKey,
        target: &EntityKey,
        kind: RelationKind,
    ) -> StoreResult<Option<Relationship>> {
        let id = self.edge_index.get(&(*source, *target, kind)).map(|i| *i);
        Ok(id.and_then(|i| self.edges.get(&i).map(|r| r.clone())))
    }

    async fn upsert_node(&self, entity: &Entity) -> StoreResult<EntityKey> {
        let _guard = self.write_lock.lock().unwrap();

        let identity = (entity.entity_type, entity.canonical_name.clone());
        if let Some(owner) = self.by_identity.get(&identity) {
            if *owner != entity.key {
                return Err(StoreError::Conflict(format!(
                    "identity ({}, {}) already owned by {}",
                    entity.entity_type, entity.canonical_name, *owner,
                )));
            }
        }
        for x in &entity.external_ids {
            if let Some(owner) = self.by_external.get(&(x.namespace.clone(), x.id.clone())) {
                if *owner != entity.key {
                    return Err(StoreError::Conflict(format!(
                        "external id {} already owned by {}",
                        x, *owner,
                    )));
                }
            }
        }

        self.entities.insert(entity.key, entity.clone());
        self.by_identity.insert(identity, entity.key);
        for x in &entity.external_ids {
            self.by_external
                .insert((x.namespace.clone(), x.id.clone()), entity.key);
        }
        Ok(entity.key)
    }

    async fn upsert_edge(&self, relationship: &Relationship) -> StoreResult<EdgeId> {
        let _guard = self.write_lock.lock().unwrap();

        let triple = (relationship.source, relationship.target, relationship.kind);
        if let Some(existing) = self.edge_index.get(&triple) {
            if *existing != relationship.id {
                return Err(StoreError::Conflict(format!(
                    "pair ({}, {}) already linked by {} as {}",
                    relationship.source, relationship.target, *existing, relationship.kind,
                )));
            }
        }

        self.edges.insert(relationship.id, relationship.clone());
        self.edge_index.insert(triple, relationship.id);
        Ok(relationship.id)
    }

    async fn count_nodes(&self) -> StoreResult<Vec<(EntityType, u64)>> {
        let mut counts: BTreeMap<EntityType, u64> = BTreeMap::new();
        for entry in self.entities.iter() {
            *counts.entry(entry.entity_type).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn count_edges(&self) -> StoreResult<Vec<(RelationKind, u64)>> {
        let mut counts: BTreeMap<RelationKind, u64> = BTreeMap::new();
        for entry in self.edges.iter() {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ExternalId;

    #[tokio::test]
    async fn node_round_trip_by_identity_and_external_id() {
        let store = MemoryStore::new();
        let entity = Entity::new(EntityType::Drug, "aspirin")
            .with_alias("Aspirin")
            .with_external_id(ExternalId::new("ncbi_mesh", "D001241"));
        store.upsert_node(&entity).await.unwrap();

        let by_name = store
            .find_node(EntityType::Drug, "aspirin")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.key, entity.key);

        let by_id = store
            .find_node_by_external_id("ncbi_mesh", "D001241")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id.key, entity.key);

        assert!(store
            .find_node(EntityType::Disease, "aspirin")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn external_id_claim_by_second_entity_conflicts() {
        let store = MemoryStore::new();
        let first = Entity::new(EntityType::Drug, "aspirin")
            .with_external_id(ExternalId::new("ncbi_mesh", "D001241"));
        store.upsert_node(&first).await.unwrap();

        let second = Entity::new(EntityType::Drug, "acetylsalicylic acid")
            .with_external_id(ExternalId::new("ncbi_mesh", "D001241"));
        let err = store.upsert_node(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn edge_round_trip_checks_exact_ordering() {
        let store = MemoryStore::new();
        let a = Entity::new(EntityType::Drug, "warfarin");
        let b = Entity::new(EntityType::Protein, "cyp2c9");
        store.upsert_node(&a).await.unwrap();
        store.upsert_node(&b).await.unwrap();

        let rel = Relationship::new(a.key, b.key, RelationKind::DrugEnzyme);
        store.upsert_edge(&rel).await.unwrap();

        assert!(store
            .find_edge(&a.key, &b.key, RelationKind::DrugEnzyme)
            .await
            .unwrap()
            .is_some());
        // reversed ordering is a different lookup for directed kinds
        assert!(store
            .find_edge(&b.key, &a.key, RelationKind::DrugEnzyme)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn counts_group_by_type_and_kind() {
        let store = MemoryStore::new();
        let a = Entity::new(EntityType::Drug, "warfarin");
        let b = Entity::new(EntityType::Drug, "aspirin");
        let c = Entity::new(EntityType::Disease, "thrombosis");
        for e in [&a, &b, &c] {
            store.upsert_node(e).await.unwrap();
        }
        store
            .upsert_edge(&Relationship::new(a.key, b.key, RelationKind::Ddi))
            .await
            .unwrap();

        let nodes = store.count_nodes().await.unwrap();
        assert!(nodes.contains(&(EntityType::Drug, 2)));
        assert!(nodes.contains(&(EntityType::Disease, 1)));
        assert_eq!(store.count_edges().await.unwrap(), vec![(RelationKind::Ddi, 1)]);
    }
}
