//! Medulla: Biomedical Knowledge Graph Reconciliation Engine
//!
//! Merges streams of extracted biomedical facts into a consistent
//! knowledge graph. Candidate entities and relationships are
//! normalized, resolved against what the graph already knows,
//! validated, and folded in with confidence tracking; every candidate
//! ends in exactly one decision, and every decision leaves an audit
//! record.
//!
//! # Core Concepts
//!
//! - **Entities**: drugs, diseases, genes, proteins, pathways and
//!   related kinds, keyed by their canonical (type, name) identity
//! - **Relationships**: typed edges with fixed endpoint signatures,
//!   directed or symmetric per kind
//! - **Decisions**: create, merge, skip or reject, each with an audit
//!   record explaining why
//!
//! # Example
//!
//! ```
//! use medulla::{MemoryStore, MergeConfig, MergeCoordinator};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let coordinator = MergeCoordinator::new(store, &MergeConfig::default());
//! // Candidates are decided through coordinator.process_batch(..)
//! ```

pub mod config;
pub mod graph;
pub mod ingest;
pub mod merge;
pub mod store;

pub use config::{ConfigError, MergeConfig, TierWeights};
pub use graph::{
    EdgeId, Entity, EntityKey, EntityType, ExternalId, ProvenanceRecord, RelationKind,
    Relationship, SourceTier,
};
pub use ingest::{
    decode_batch, BatchDecode, DecodeError, DecodeFailure, DocumentFacts, EndpointRef,
    EntityCandidate, RelationCandidate,
};
pub use merge::{
    AuditLog, AuditReason, AuditRecord, Decision, MergeCoordinator, MergeError, RunReport,
    RunSummary,
};
pub use store::{GraphStore, MemoryStore, OpenStore, SqliteStore, StoreError, StoreResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
