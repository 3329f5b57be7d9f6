//! Relationship representation between resolved entities

use super::entity::EntityKey;
use super::provenance::ProvenanceRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a relationship, derived from kind and endpoints.
///
/// For symmetric kinds the endpoints are sorted before derivation, so
/// (A, B) and (B, A) yield the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(Uuid);

impl EdgeId {
    /// Derive the id for a (kind, source, target) triple.
    pub fn derive(kind: RelationKind, source: &EntityKey, target: &EntityKey) -> Self {
        let (a, b) = if kind.is_symmetric() && target < source {
            (target, source)
        } else {
            (source, target)
        };
        let seed = format!("{}\n{}\n{}", kind.as_label(), a, b);
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()))
    }

    /// Create an EdgeId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of relationship kinds the graph accepts.
///
/// Raw kind strings are mapped onto this set by the validator's alias
/// table. Each kind fixes an endpoint signature (see merge::validate);
/// DDI and PPI are symmetric, the rest are directed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    DrugDiseaseAssociation,
    DrugTarget,
    DrugCarrier,
    DrugEnzyme,
    DrugTransporter,
    Dpi,
    Ddi,
    Ppi,
    ProteinDiseaseAssociation,
    DrugPathwayAssociation,
    DiseasePathwayAssociation,
    ProteinPathwayAssociation,
    RelatedGeneticDisorder,
    DiseaseGeneticDisorder,
    ComplexInPathway,
    ComplexTopLevelPathway,
}

impl RelationKind {
    /// All accepted kinds, in display order.
    pub const ALL: [RelationKind; 16] = [
        RelationKind::DrugDiseaseAssociation,
        RelationKind::DrugTarget,
        RelationKind::DrugCarrier,
        RelationKind::DrugEnzyme,
        RelationKind::DrugTransporter,
        RelationKind::Dpi,
        RelationKind::Ddi,
        RelationKind::Ppi,
        RelationKind::ProteinDiseaseAssociation,
        RelationKind::DrugPathwayAssociation,
        RelationKind::DiseasePathwayAssociation,
        RelationKind::ProteinPathwayAssociation,
        RelationKind::RelatedGeneticDisorder,
        RelationKind::DiseaseGeneticDisorder,
        RelationKind::ComplexInPathway,
        RelationKind::ComplexTopLevelPathway,
    ];

    /// Canonical label, as stored and displayed.
    pub fn as_label(&self) -> &'static str {
        match self {
            RelationKind::DrugDiseaseAssociation => "DRUG_DISEASE_ASSOCIATION",
            RelationKind::DrugTarget => "DRUG_TARGET",
            RelationKind::DrugCarrier => "DRUG_CARRIER",
            RelationKind::DrugEnzyme => "DRUG_ENZYME",
            RelationKind::DrugTransporter => "DRUG_TRANSPORTER",
            RelationKind::Dpi => "DPI",
            RelationKind::Ddi => "DDI",
            RelationKind::Ppi => "PPI",
            RelationKind::ProteinDiseaseAssociation => "PROTEIN_DISEASE_ASSOCIATION",
            RelationKind::DrugPathwayAssociation => "DRUG_PATHWAY_ASSOCIATION",
            RelationKind::DiseasePathwayAssociation => "DISEASE_PATHWAY_ASSOCIATION",
            RelationKind::ProteinPathwayAssociation => "PROTEIN_PATHWAY_ASSOCIATION",
            RelationKind::RelatedGeneticDisorder => "RELATED_GENETIC_DISORDER",
            RelationKind::DiseaseGeneticDisorder => "DISEASE_GENETIC_DISORDER",
            RelationKind::ComplexInPathway => "COMPLEX_IN_PATHWAY",
            RelationKind::ComplexTopLevelPathway => "COMPLEX_TOP_LEVEL_PATHWAY",
        }
    }

    /// Parse a canonical label back into a kind.
    pub fn from_label(label: &str) -> Option<Self> {
        RelationKind::ALL.into_iter().find(|k| k.as_label() == label)
    }

    /// Whether (A, B) and (B, A) denote the same relationship.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, RelationKind::Ddi | RelationKind::Ppi)
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A relationship between two resolved entities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Stable identity-derived id
    pub id: EdgeId,
    /// Source entity key
    pub source: EntityKey,
    /// Target entity key
    pub target: EntityKey,
    /// Relationship kind
    pub kind: RelationKind,
    /// Current confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Evidence trail, one record per absorbed candidate
    pub sources: Vec<ProvenanceRecord>,
    /// When the relationship was created
    pub created_at: DateTime<Utc>,
    /// When the relationship last absorbed evidence
    pub updated_at: DateTime<Utc>,
}

impl Relationship {
    /// Create a new relationship between resolved entity keys.
    ///
    /// For symmetric kinds the endpoints are stored in sorted order so the
    /// same unordered pair always produces the same row. Confidence starts
    /// at zero until evidence is folded in through the aggregator.
    pub fn new(source: EntityKey, target: EntityKey, kind: RelationKind) -> Self {
        let (source, target) = if kind.is_symmetric() && target < source {
            (target, source)
        } else {
            (source, target)
        };
        let now = Utc::now();
        Self {
            id: EdgeId::derive(kind, &source, &target),
            source,
            target,
            kind,
            confidence: 0.0,
            sources: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether endpoint order is meaningful for this relationship.
    pub fn is_directed(&self) -> bool {
        !self.kind.is_symmetric()
    }

    /// Whether this relationship connects the given unordered pair.
    pub fn connects(&self, a: &EntityKey, b: &EntityKey) -> bool {
        (self.source == *a && self.target == *b) || (self.source == *b && self.target == *a)
    }
}
