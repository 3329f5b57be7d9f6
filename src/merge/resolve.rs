//! Identity resolution: mapping canonical candidates onto graph rows

use crate::graph::{Entity, EntityType, ExternalId};
use crate::store::{GraphStore, StoreResult};
use std::sync::Arc;
use tracing::warn;

/// Outcome of resolving a canonical (type, name, external id) claim
#[derive(Debug)]
pub enum Resolution {
    /// The candidate denotes this existing entity
    Existing(Entity),
    /// No entity matches the candidate
    NotFound,
    /// The external id and the name match different entities. The
    /// candidate is contradictory and must not be merged into either.
    Conflict { by_id: Entity, by_name: Entity },
}

/// Resolves candidates against the store.
///
/// An external-id match takes precedence over a name match. The id
/// lookup is only honored when the owner's type is compatible with the
/// candidate's claimed type (genes and proteins count as compatible);
/// an incompatible owner is ignored with a warning, which leaves the
/// store's uniqueness check to surface the contradiction if the
/// candidate then tries to claim the id.
pub struct IdentityResolver {
    store: Arc<dyn GraphStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(
        &self,
        entity_type: EntityType,
        canonical_name: &str,
        external_id: Option<&ExternalId>,
    ) -> StoreResult<Resolution> {
        let by_id = match external_id {
            Some(x) => {
                let owner = self
                    .store
                    .find_node_by_external_id(&x.namespace, &x.id)
                    .await?;
                match owner {
                    Some(e) if !e.entity_type.compatible_with(entity_type) => {
                        warn!(
                            external_id = %x,
                            owner_type = %e.entity_type,
                            claimed_type = %entity_type,
                            "external id owner has incompatible type, ignoring id match"
                        );
                        None
                    }
                    other => other,
                }
            }
            None => None,
        };
        let by_name = self.store.find_node(entity_type, canonical_name).await?;

        Ok(match (by_id, by_name) {
            (Some(a), Some(b)) if a.key != b.key => Resolution::Conflict { by_id: a, by_name: b },
            (Some(a), _) => Resolution::Existing(a),
            (None, Some(b)) => Resolution::Existing(b),
            (None, None) => Resolution::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let aspirin = Entity::new(EntityType::Drug, "aspirin")
            .with_external_id(ExternalId::new("ncbi_mesh", "D001241"));
        store.upsert_node(&aspirin).await.unwrap();
        store
    }

    #[tokio::test]
    async fn resolves_by_name() {
        let store = seeded_store().await;
        let resolver = IdentityResolver::new(store);
        let resolution = resolver
            .resolve(EntityType::Drug, "aspirin", None)
            .await
            .unwrap();
        assert!(matches!(resolution, Resolution::Existing(e) if e.canonical_name == "aspirin"));
    }

    #[tokio::test]
    async fn external_id_match_wins_over_missing_name() {
        let store = seeded_store().await;
        let resolver = IdentityResolver::new(store);
        let id = ExternalId::new("ncbi_mesh", "D001241");
        let resolution = resolver
            .resolve(EntityType::Drug, "acetylsalicylic acid", Some(&id))
            .await
            .unwrap();
        assert!(matches!(resolution, Resolution::Existing(e) if e.canonical_name == "aspirin"));
    }

    #[tokio::test]
    async fn disagreeing_matches_are_a_conflict() {
        let store = seeded_store().await;
        let other = Entity::new(EntityType::Drug, "acetylsalicylic acid");
        store.upsert_node(&other).await.unwrap();

        let resolver = IdentityResolver::new(store);
        let id = ExternalId::new("ncbi_mesh", "D001241");
        let resolution = resolver
            .resolve(EntityType::Drug, "acetylsalicylic acid", Some(&id))
            .await
            .unwrap();
        let Resolution::Conflict { by_id, by_name } = resolution else {
            panic!("expected conflict");
        };
        assert_eq!(by_id.canonical_name, "aspirin");
        assert_eq!(by_name.canonical_name, "acetylsalicylic acid");
    }

    #[tokio::test]
    async fn incompatible_id_owner_is_ignored() {
        let store = seeded_store().await;
        let resolver = IdentityResolver::new(store);
        // same id, but claimed as a disease
        let id = ExternalId::new("ncbi_mesh", "D001241");
        let resolution = resolver
            .resolve(EntityType::Disease, "aspirin allergy", Some(&id))
            .await
            .unwrap();
        assert!(matches!(resolution, Resolution::NotFound));
    }

    #[tokio::test]
    async fn gene_claim_accepts_protein_id_owner() {
        let store = Arc::new(MemoryStore::new());
        let protein = Entity::new(EntityType::Protein, "tumor protein p53")
            .with_external_id(ExternalId::new("uniprot", "P04637"));
        store.upsert_node(&protein).await.unwrap();

        let resolver = IdentityResolver::new(store);
        let id = ExternalId::new("uniprot", "P04637");
        let resolution = resolver
            .resolve(EntityType::Gene, "tp53", Some(&id))
            .await
            .unwrap();
        assert!(matches!(resolution, Resolution::Existing(e) if e.entity_type == EntityType::Protein));
    }

    #[tokio::test]
    async fn unknown_candidate_is_not_found() {
        let store = seeded_store().await;
        let resolver = IdentityResolver::new(store);
        let resolution = resolver
            .resolve(EntityType::Drug, "ibuprofen", None)
            .await
            .unwrap();
        assert!(matches!(resolution, Resolution::NotFound));
    }
}
