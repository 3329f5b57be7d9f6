//! Core graph data structures

mod entity;
mod provenance;
mod relation;

pub use entity::{Entity, EntityKey, EntityType, ExternalId};
pub use provenance::{ProvenanceRecord, SourceTier};
pub use relation::{EdgeId, RelationKind, Relationship};
