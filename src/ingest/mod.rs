//! Candidate facts and extraction-document decoding

mod document;

pub use document::{decode_batch, BatchDecode, DecodeError, DecodeFailure};

use crate::graph::{ExternalId, ProvenanceRecord};

/// A raw entity assertion awaiting reconciliation.
///
/// Name and type are as the upstream extractor produced them; nothing
/// is normalized yet.
#[derive(Debug, Clone)]
pub struct EntityCandidate {
    pub raw_name: String,
    pub raw_type: String,
    pub external_id: Option<ExternalId>,
    pub provenance: ProvenanceRecord,
}

impl EntityCandidate {
    pub fn new(
        raw_name: impl Into<String>,
        raw_type: impl Into<String>,
        provenance: ProvenanceRecord,
    ) -> Self {
        Self {
            raw_name: raw_name.into(),
            raw_type: raw_type.into(),
            external_id: None,
            provenance,
        }
    }

    pub fn with_external_id(mut self, id: ExternalId) -> Self {
        self.external_id = Some(id);
        self
    }
}

/// One endpoint of a candidate relationship
#[derive(Debug, Clone)]
pub struct EndpointRef {
    pub raw_name: String,
    pub raw_type: String,
    pub external_id: Option<ExternalId>,
}

impl EndpointRef {
    pub fn new(raw_name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        Self {
            raw_name: raw_name.into(),
            raw_type: raw_type.into(),
            external_id: None,
        }
    }

    pub fn with_external_id(mut self, id: ExternalId) -> Self {
        self.external_id = Some(id);
        self
    }
}

/// A raw relationship assertion awaiting reconciliation
#[derive(Debug, Clone)]
pub struct RelationCandidate {
    pub raw_kind: String,
    pub source: EndpointRef,
    pub target: EndpointRef,
    pub provenance: ProvenanceRecord,
}

impl RelationCandidate {
    pub fn new(
        raw_kind: impl Into<String>,
        source: EndpointRef,
        target: EndpointRef,
        provenance: ProvenanceRecord,
    ) -> Self {
        Self {
            raw_kind: raw_kind.into(),
            source,
            target,
            provenance,
        }
    }
}

/// All candidate facts decoded from one document. Entities come before
/// relationships so endpoint lookups see the document's own entities.
#[derive(Debug, Clone, Default)]
pub struct DocumentFacts {
    pub document_id: String,
    pub entities: Vec<EntityCandidate>,
    pub relations: Vec<RelationCandidate>,
}

impl DocumentFacts {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            entities: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}
