//! Confidence aggregation over accumulating evidence

use crate::graph::{Entity, ProvenanceRecord, Relationship};
use chrono::Utc;
use std::sync::Arc;

/// Combination rule for folding one piece of evidence into an existing
/// confidence value. Implementations must stay inside [0, 1] and never
/// decrease the existing value for a non-negative weight.
pub trait ConfidenceModel: Send + Sync {
    fn combine(&self, existing: f64, evidence_weight: f64) -> f64;
}

/// Treats each piece of evidence as an independent observation:
/// `1 - (1 - existing) * (1 - weight)`.
///
/// Repeated support approaches 1.0 without reaching it, and a weak
/// source can never lower confidence established by a strong one.
pub struct IndependentEvidence;

impl ConfidenceModel for IndependentEvidence {
    fn combine(&self, existing: f64, evidence_weight: f64) -> f64 {
        let existing = existing.clamp(0.0, 1.0);
        let weight = evidence_weight.clamp(0.0, 1.0);
        (1.0 - (1.0 - existing) * (1.0 - weight)).clamp(0.0, 1.0)
    }
}

/// Confidence before and after absorbing one candidate
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceDelta {
    pub before: f64,
    pub after: f64,
}

/// The only writer of confidence values and provenance trails.
///
/// Folding a candidate in appends its provenance record and recomputes
/// confidence through the model; nothing else mutates either field.
pub struct ConfidenceAggregator {
    model: Arc<dyn ConfidenceModel>,
}

impl ConfidenceAggregator {
    pub fn new(model: Arc<dyn ConfidenceModel>) -> Self {
        Self { model }
    }

    /// Aggregator using the independent-evidence rule.
    pub fn independent() -> Self {
        Self::new(Arc::new(IndependentEvidence))
    }

    /// Fold one candidate's evidence into an entity.
    pub fn reinforce_entity(
        &self,
        entity: &mut Entity,
        record: ProvenanceRecord,
        weight: f64,
    ) -> ConfidenceDelta {
        let before = entity.confidence;
        entity.confidence = self.model.combine(before, weight);
        entity.sources.push(record);
        entity.updated_at = Utc::now();
        ConfidenceDelta {
            before,
            after: entity.confidence,
        }
    }

    /// Fold one candidate's evidence into a relationship.
    pub fn reinforce_relationship(
        &self,
        relationship: &mut Relationship,
        record: ProvenanceRecord,
        weight: f64,
    ) -> ConfidenceDelta {
        let before = relationship.confidence;
        relationship.confidence = self.model.combine(before, weight);
        relationship.sources.push(record);
        relationship.updated_at = Utc::now();
        ConfidenceDelta {
            before,
            after: relationship.confidence,
        }
    }
}
