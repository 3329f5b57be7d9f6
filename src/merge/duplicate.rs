//! Duplicate detection for candidate relationships

use crate::graph::{EntityKey, RelationKind, Relationship};
use crate::store::{GraphStore, StoreResult};
use std::sync::Arc;

/// Finds the existing relationship a candidate would duplicate.
///
/// Directed kinds are checked in the given orientation only. Symmetric
/// kinds are checked in both orientations, so a stored (A, B) PPI also
/// answers for a candidate (B, A).
pub struct DuplicateChecker {
    store: Arc<dyn GraphStore>,
}

impl DuplicateChecker {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub async fn existing(
        &self,
        source: &EntityKey,
        target: &EntityKey,
        kind: RelationKind,
    ) -> StoreResult<Option<Relationship>> {
        if let Some(found) = self.store.find_edge(source, target, kind).await? {
            return Ok(Some(found));
        }
        if kind.is_symmetric() {
            if let Some(found) = self.store.find_edge(target, source, kind).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Entity, EntityType};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn symmetric_duplicates_found_in_either_orientation() {
        let store = Arc::new(MemoryStore::new());
        let a = Entity::new(EntityType::Protein, "brca1");
        let b = Entity::new(EntityType::Protein, "tp53");
        store.upsert_node(&a).await.unwrap();
        store.upsert_node(&b).await.unwrap();
        store
            .upsert_edge(&Relationship::new(a.key, b.key, RelationKind::Ppi))
            .await
            .unwrap();

        let checker = DuplicateChecker::new(store);
        assert!(checker
            .existing(&a.key, &b.key, RelationKind::Ppi)
            .await
            .unwrap()
            .is_some());
        assert!(checker
            .existing(&b.key, &a.key, RelationKind::Ppi)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn directed_check_respects_orientation() {
        let store = Arc::new(MemoryStore::new());
        let drug = Entity::new(EntityType::Drug, "imatinib");
        let gene = Entity::new(EntityType::Gene, "abl1");
        store.upsert_node(&drug).await.unwrap();
        store.upsert_node(&gene).await.unwrap();
        store
            .upsert_edge(&Relationship::new(drug.key, gene.key, RelationKind::DrugTarget))
            .await
            .unwrap();

        let checker = DuplicateChecker::new(store);
        assert!(checker
            .existing(&drug.key, &gene.key, RelationKind::DrugTarget)
            .await
            .unwrap()
            .is_some());
        assert!(checker
            .existing(&gene.key, &drug.key, RelationKind::DrugTarget)
            .await
            .unwrap()
            .is_none());
        // same pair under a different kind is not a duplicate
        assert!(checker
            .existing(&drug.key, &gene.key, RelationKind::Dpi)
            .await
            .unwrap()
            .is_none());
    }
}
