//! Entity representation in the biomedical knowledge graph

use super::provenance::ProvenanceRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for an entity, derived from its resolved identity.
///
/// The key is a UUIDv5 of the canonical type and name, so re-deriving the
/// key for the same identity always yields the same value. Two writers that
/// resolve a candidate to the same identity therefore address the same row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntityKey(Uuid);

impl EntityKey {
    /// Derive the key for a canonical (type, name) identity.
    pub fn derive(entity_type: EntityType, canonical_name: &str) -> Self {
        let seed = format!("{}\n{}", entity_type.as_label(), canonical_name);
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()))
    }

    /// Create an EntityKey from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of entity types the graph accepts.
///
/// Raw type strings from upstream extractors are mapped onto this set by the
/// normalizer's alias table; anything unmapped is rejected rather than
/// admitted as a free-form label.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Drug,
    Disease,
    Gene,
    Protein,
    Pathway,
    Complex,
    GeneticDisorder,
}

impl EntityType {
    /// All accepted types, in display order.
    pub const ALL: [EntityType; 7] = [
        EntityType::Drug,
        EntityType::Disease,
        EntityType::Gene,
        EntityType::Protein,
        EntityType::Pathway,
        EntityType::Complex,
        EntityType::GeneticDisorder,
    ];

    /// Canonical label, as stored and displayed.
    pub fn as_label(&self) -> &'static str {
        match self {
            EntityType::Drug => "DRUG",
            EntityType::Disease => "DISEASE",
            EntityType::Gene => "GENE",
            EntityType::Protein => "PROTEIN",
            EntityType::Pathway => "PATHWAY",
            EntityType::Complex => "COMPLEX",
            EntityType::GeneticDisorder => "GENETIC_DISORDER",
        }
    }

    /// Parse a canonical label back into a type.
    pub fn from_label(label: &str) -> Option<Self> {
        EntityType::ALL.into_iter().find(|t| t.as_label() == label)
    }

    /// Genes and proteins are interchangeable endpoints for most
    /// relationship kinds; extractors rarely distinguish them reliably.
    pub fn is_proteinoid(&self) -> bool {
        matches!(self, EntityType::Gene | EntityType::Protein)
    }

    /// Whether two types count as the same identity pool during resolution.
    pub fn compatible_with(&self, other: EntityType) -> bool {
        *self == other || (self.is_proteinoid() && other.is_proteinoid())
    }

    /// The other member of the gene/protein pool, for types in it.
    pub fn proteinoid_sibling(&self) -> Option<EntityType> {
        match self {
            EntityType::Gene => Some(EntityType::Protein),
            EntityType::Protein => Some(EntityType::Gene),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A namespaced identifier from an external vocabulary (MeSH, ChEBI, UniProt).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalId {
    /// Vocabulary namespace, lowercase (e.g. "ncbi_mesh", "chebi").
    pub namespace: String,
    /// Identifier within the namespace, as issued (e.g. "D001241").
    pub id: String,
}

impl ExternalId {
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

/// An entity in the knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identity-derived key
    pub key: EntityKey,
    /// Canonical type
    pub entity_type: EntityType,
    /// Normalized name the key was derived from
    pub canonical_name: String,
    /// Raw surface forms seen for this entity, in first-seen order
    pub aliases: Vec<String>,
    /// External vocabulary identifiers, in first-seen order
    pub external_ids: Vec<ExternalId>,
    /// Current confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Evidence trail, one record per absorbed candidate
    pub sources: Vec<ProvenanceRecord>,
    /// When the entity was created
    pub created_at: DateTime<Utc>,
    /// When the entity last absorbed evidence
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Create a new entity for a canonical identity.
    ///
    /// `canonical_name` must already be in normalized form; the key is
    /// derived from it. Confidence starts at zero until evidence is folded
    /// in through the aggregator.
    pub fn new(entity_type: EntityType, canonical_name: impl Into<String>) -> Self {
        let canonical_name = canonical_name.into();
        let now = Utc::now();
        Self {
            key: EntityKey::derive(entity_type, &canonical_name),
            entity_type,
            canonical_name,
            aliases: Vec::new(),
            external_ids: Vec::new(),
            confidence: 0.0,
            sources: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add an alias at construction time
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.add_alias(&alias.into());
        self
    }

    /// Add an external identifier at construction time
    pub fn with_external_id(mut self, id: ExternalId) -> Self {
        self.add_external_id(id);
        self
    }

    /// Record a raw surface form, skipping case-insensitive duplicates.
    /// Returns whether the alias was new.
    pub fn add_alias(&mut self, alias: &str) -> bool {
        let alias = alias.trim();
        if alias.is_empty() {
            return false;
        }
        let lower = alias.to_lowercase();
        if self.aliases.iter().any(|a| a.to_lowercase() == lower) {
            return false;
        }
        self.aliases.push(alias.to_string());
        true
    }

    /// Record an external identifier, skipping duplicates.
    /// Returns whether the identifier was new.
    pub fn add_external_id(&mut self, id: ExternalId) -> bool {
        if self.external_ids.contains(&id) {
            return false;
        }
        self.external_ids.push(id);
        true
    }

    /// Whether this entity carries the given external identifier.
    pub fn has_external_id(&self, namespace: &str, id: &str) -> bool {
        self.external_ids
            .iter()
            .any(|x| x.namespace == namespace && x.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_derivation_is_stable() {
        let a = EntityKey::derive(EntityType::Drug, "aspirin");
        let b = EntityKey::derive(EntityType::Drug, "aspirin");
        assert_eq!(a, b);
    }

    #[test]
    fn key_derivation_separates_types_and_names() {
        let drug = EntityKey::derive(EntityType::Drug, "aspirin");
        let disease = EntityKey::derive(EntityType::Disease, "aspirin");
        let other = EntityKey::derive(EntityType::Drug, "ibuprofen");
        assert_ne!(drug, disease);
        assert_ne!(drug, other);
    }

    #[test]
    fn labels_round_trip() {
        for t in EntityType::ALL {
            assert_eq!(EntityType::from_label(t.as_label()), Some(t));
        }
        assert_eq!(EntityType::from_label("PLANET"), None);
    }

    #[test]
    fn proteinoid_compatibility() {
        assert!(EntityType::Gene.compatible_with(EntityType::Protein));
        assert!(EntityType::Protein.compatible_with(EntityType::Gene));
        assert!(EntityType::Drug.compatible_with(EntityType::Drug));
        assert!(!EntityType::Drug.compatible_with(EntityType::Disease));
        assert!(!EntityType::Gene.compatible_with(EntityType::Pathway));
    }

    #[test]
    fn aliases_deduplicate_case_insensitively() {
        let mut e = Entity::new(EntityType::Drug, "aspirin");
        assert!(e.add_alias("Aspirin"));
        assert!(!e.add_alias("ASPIRIN"));
        assert!(!e.add_alias("  aspirin  "));
        assert!(e.add_alias("acetylsalicylic acid"));
        assert_eq!(e.aliases, vec!["Aspirin", "acetylsalicylic acid"]);
    }

    #[test]
    fn external_ids_deduplicate_exactly() {
        let mut e = Entity::new(EntityType::Drug, "aspirin");
        assert!(e.add_external_id(ExternalId::new("ncbi_mesh", "D001241")));
        assert!(!e.add_external_id(ExternalId::new("ncbi_mesh", "D001241")));
        assert!(e.add_external_id(ExternalId::new("chebi", "15365")));
        assert!(e.has_external_id("ncbi_mesh", "D001241"));
        assert!(!e.has_external_id("ncbi_mesh", "D000001"));
    }
}
