//! Relationship validation: kind mapping and endpoint signatures

use crate::config::MergeConfig;
use crate::graph::{EntityType, RelationKind};
use std::collections::HashMap;

/// How a candidate's endpoints line up with the kind's signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Endpoints already satisfy the signature
    AsGiven,
    /// Endpoints satisfy the signature with source and target swapped
    Reversed,
}

/// Maps raw relationship-kind strings onto the closed kind set and
/// checks endpoint types against each kind's signature.
///
/// Directed kinds have one legal direction; a candidate stated
/// backwards (disease before drug, say) is reoriented rather than
/// rejected. Lookups are case-insensitive.
pub struct RelationshipValidator {
    aliases: HashMap<String, RelationKind>,
}

impl RelationshipValidator {
    pub fn new(config: &MergeConfig) -> Self {
        Self {
            aliases: config.relation_aliases.clone(),
        }
    }

    /// Map a raw kind string onto the closed set, if it is known.
    pub fn kind(&self, raw: &str) -> Option<RelationKind> {
        self.aliases.get(raw.trim().to_lowercase().as_str()).copied()
    }

    /// Check whether (source, target) types can carry this kind,
    /// possibly after swapping. `None` means no orientation fits.
    pub fn check_endpoints(
        &self,
        kind: RelationKind,
        source: EntityType,
        target: EntityType,
    ) -> Option<Orientation> {
        if signature_accepts(kind, source, target) {
            Some(Orientation::AsGiven)
        } else if !kind.is_symmetric() && signature_accepts(kind, target, source) {
            Some(Orientation::Reversed)
        } else {
            None
        }
    }
}

/// The endpoint signature of each kind, in its canonical direction.
fn signature_accepts(kind: RelationKind, source: EntityType, target: EntityType) -> bool {
    use EntityType::*;
    use RelationKind::*;
    match kind {
        DrugDiseaseAssociation => source == Drug && target == Disease,
        DrugTarget | DrugCarrier | DrugEnzyme | DrugTransporter | Dpi => {
            source == Drug && target.is_proteinoid()
        }
        Ddi => source == Drug && target == Drug,
        Ppi => source.is_proteinoid() && target.is_proteinoid(),
        ProteinDiseaseAssociation => source.is_proteinoid() && target == Disease,
        DrugPathwayAssociation => source == Drug && target == Pathway,
        DiseasePathwayAssociation => source == Disease && target == Pathway,
        ProteinPathwayAssociation => source.is_proteinoid() && target == Pathway,
        RelatedGeneticDisorder => source.is_proteinoid() && target == GeneticDisorder,
        DiseaseGeneticDisorder => source == Disease && target == GeneticDisorder,
        ComplexInPathway | ComplexTopLevelPathway => source == Complex && target == Pathway,
    }
}
