//! The merge pipeline: from raw candidate facts to graph decisions
//!
//! Candidates pass through normalization, identity resolution,
//! relationship validation and duplicate detection before the
//! coordinator commits a decision and the confidence aggregator folds
//! the new evidence in. Every decision leaves an audit record.

mod audit;
mod confidence;
mod coordinator;
mod duplicate;
mod locks;
mod normalize;
mod resolve;
mod validate;

pub use audit::{AuditLog, AuditReason, AuditRecord, Decision, RunReport, RunSummary};
pub use confidence::{
    ConfidenceAggregator, ConfidenceDelta, ConfidenceModel, IndependentEvidence,
};
pub use coordinator::{MergeCoordinator, MergeError};
pub use duplicate::DuplicateChecker;
pub use locks::KeyLocks;
pub use normalize::{canonical_name, Normalizer};
pub use resolve::{IdentityResolver, Resolution};
pub use validate::{Orientation, RelationshipValidator};
