//! Provenance records: where a piece of evidence entered the graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Evidence class of a source.
///
/// The tier fixes the base weight a candidate contributes when it is
/// folded into an entity or relationship (see config::TierWeights).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    /// Hand-curated reference databases (DrugBank, MeSH, Reactome)
    Curated,
    /// Model-extracted facts from literature mining
    AiExtracted,
    /// Unreviewed submissions and legacy imports
    Unverified,
}

impl std::fmt::Display for SourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceTier::Curated => "curated",
            SourceTier::AiExtracted => "ai_extracted",
            SourceTier::Unverified => "unverified",
        };
        f.write_str(name)
    }
}

/// The record of one piece of supporting evidence.
///
/// Appended to an entity or relationship every time a candidate fact is
/// folded into it. The trail is append-only and never deduplicated, so
/// repeated observations stay visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Producing pipeline or database (e.g. "pubtator_extraction")
    pub origin: String,
    /// Evidence class, used to look up the contribution weight
    pub tier: SourceTier,
    /// Reference to the raw evidence (document id, accession, URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    /// When the evidence was observed
    pub timestamp: DateTime<Utc>,
}

impl ProvenanceRecord {
    /// Create a record stamped with the current time.
    pub fn new(origin: impl Into<String>, tier: SourceTier) -> Self {
        Self {
            origin: origin.into(),
            tier,
            document: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the raw-evidence reference.
    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_carries_document_reference() {
        let record = ProvenanceRecord::new("pubtator_extraction", SourceTier::AiExtracted)
            .with_document("PMID:38012345");
        assert_eq!(record.origin, "pubtator_extraction");
        assert_eq!(record.document.as_deref(), Some("PMID:38012345"));
    }

    #[test]
    fn tier_serializes_snake_case() {
        let json = serde_json::to_string(&SourceTier::AiExtracted).unwrap();
        assert_eq!(json, "\"ai_extracted\"");
    }
}
