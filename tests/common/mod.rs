//! Common test utilities for the merge pipeline integration tests
//!
//! Candidate constructors shared across the integration suites. All
//! candidates carry AI-extracted provenance from a PubTator-style
//! origin unless a test builds its own provenance record.

use medulla::{EndpointRef, EntityCandidate, ProvenanceRecord, RelationCandidate, SourceTier};

/// Provenance for an AI-extracted fact from the given document
pub fn provenance(document: &str) -> ProvenanceRecord {
    ProvenanceRecord::new("pubtator_extraction", SourceTier::AiExtracted).with_document(document)
}

/// Entity candidate with raw surface forms, attributed to `document`
pub fn entity(raw_name: &str, raw_type: &str, document: &str) -> EntityCandidate {
    EntityCandidate::new(raw_name, raw_type, provenance(document))
}

/// Relationship candidate between two raw endpoints, attributed to `document`
pub fn relation(
    raw_kind: &str,
    source: (&str, &str),
    target: (&str, &str),
    document: &str,
) -> RelationCandidate {
    RelationCandidate::new(
        raw_kind,
        EndpointRef::new(source.0, source.1),
        EndpointRef::new(target.0, target.1),
        provenance(document),
    )
}
