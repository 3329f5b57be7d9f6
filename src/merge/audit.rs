//! Audit records and run summaries
//!
//! Every candidate fact ends in exactly one decision, and every
//! decision leaves an audit record. The log is append-only; records
//! are never revised after the fact.

use crate::graph::{EdgeId, EntityKey, EntityType, RelationKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal decision for one candidate fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// A new entity or relationship was written
    Created,
    /// The candidate was folded into an existing row
    Merged,
    /// Nothing to do (e.g. a self-loop after resolution)
    Skipped,
    /// The candidate was refused; the graph is untouched
    Rejected,
    /// Store retries were exhausted; the candidate was not committed
    Failed,
    /// The store became unavailable before this candidate was attempted
    Deferred,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Decision::Created => "created",
            Decision::Merged => "merged",
            Decision::Skipped => "skipped",
            Decision::Rejected => "rejected",
            Decision::Failed => "failed",
            Decision::Deferred => "deferred",
        };
        f.write_str(name)
    }
}

/// Why a candidate did not produce a write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AuditReason {
    /// The raw entity type maps onto nothing in the closed set
    UnknownEntityType { raw: String },
    /// The raw relationship kind maps onto nothing in the closed set
    UnknownRelationshipType { raw: String },
    /// No orientation of the endpoint types satisfies the kind
    TypeMismatch {
        kind: RelationKind,
        source: EntityType,
        target: EntityType,
    },
    /// External-id and name resolution point at different entities
    IdentityConflict {
        by_external_id: EntityKey,
        by_name: EntityKey,
    },
    /// The name normalized to the empty string
    EmptyName,
    /// Both endpoints resolved to the same entity
    SelfLoopAfterResolution,
    /// A relationship endpoint does not exist in the graph
    MissingEndpoint { name: String },
    /// A store conflict persisted through the merge retry
    UnresolvedStoreConflict,
    /// Store retries were exhausted
    StoreTimeout { attempts: u32 },
    /// The store became unreachable
    StoreUnavailable,
}

impl std::fmt::Display for AuditReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditReason::UnknownEntityType { raw } => write!(f, "unknown entity type {raw:?}"),
            AuditReason::UnknownRelationshipType { raw } => {
                write!(f, "unknown relationship type {raw:?}")
            }
            AuditReason::TypeMismatch { kind, source, target } => {
                write!(f, "{kind} cannot connect {source} to {target}")
            }
            AuditReason::IdentityConflict { by_external_id, by_name } => {
                write!(f, "external id resolves to {by_external_id}, name to {by_name}")
            }
            AuditReason::EmptyName => f.write_str("name normalized to nothing"),
            AuditReason::SelfLoopAfterResolution => {
                f.write_str("both endpoints resolved to the same entity")
            }
            AuditReason::MissingEndpoint { name } => write!(f, "missing endpoint {name:?}"),
            AuditReason::UnresolvedStoreConflict => {
                f.write_str("store conflict persisted through retry")
            }
            AuditReason::StoreTimeout { attempts } => {
                write!(f, "store timed out after {attempts} attempts")
            }
            AuditReason::StoreUnavailable => f.write_str("store unavailable"),
        }
    }
}

/// One decision about one candidate fact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<AuditReason>,
    /// Human-readable description of the candidate
    pub subject: String,
    /// Document the candidate came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_key: Option<EntityKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RelationKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<EdgeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_before: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_after: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(decision: Decision, subject: impl Into<String>) -> Self {
        Self {
            decision,
            reason: None,
            subject: subject.into(),
            document: None,
            entity_type: None,
            entity_key: None,
            kind: None,
            edge_id: None,
            confidence_before: None,
            confidence_after: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: AuditReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_document(mut self, document: Option<&str>) -> Self {
        self.document = document.map(str::to_string);
        self
    }

    pub fn with_entity(mut self, entity_type: EntityType, key: EntityKey) -> Self {
        self.entity_type = Some(entity_type);
        self.entity_key = Some(key);
        self
    }

    pub fn with_edge(mut self, kind: RelationKind, id: EdgeId) -> Self {
        self.kind = Some(kind);
        self.edge_id = Some(id);
        self
    }

    pub fn with_confidence(mut self, before: f64, after: f64) -> Self {
        self.confidence_before = Some(before);
        self.confidence_after = Some(after);
        self
    }
}

/// Append-only sequence of audit records for a run
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct AuditLog {
    records: Vec<AuditRecord>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: AuditRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuditRecord> {
        self.records.iter()
    }

    /// Records with a given decision, for reporting
    pub fn with_decision(&self, decision: Decision) -> impl Iterator<Item = &AuditRecord> {
        self.records.iter().filter(move |r| r.decision == decision)
    }
}

/// Aggregate counts over one batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub created: u64,
    pub merged: u64,
    pub skipped: u64,
    pub rejected: u64,
    pub failed: u64,
    pub deferred: u64,
    pub documents_processed: u64,
    pub documents_failed: u64,
    pub documents_deferred: u64,
    /// New entities per type label
    pub entities_created: BTreeMap<String, u64>,
    /// New relationships per kind label
    pub relationships_created: BTreeMap<String, u64>,
}

impl RunSummary {
    /// Fold one audit record into the counts.
    pub fn observe(&mut self, record: &AuditRecord) {
        match record.decision {
            Decision::Created => self.created += 1,
            Decision::Merged => self.merged += 1,
            Decision::Skipped => self.skipped += 1,
            Decision::Rejected => self.rejected += 1,
            Decision::Failed => self.failed += 1,
            Decision::Deferred => self.deferred += 1,
        }
        if record.decision == Decision::Created {
            if let Some(entity_type) = record.entity_type {
                *self
                    .entities_created
                    .entry(entity_type.as_label().to_string())
                    .or_insert(0) += 1;
            }
            if let Some(kind) = record.kind {
                *self
                    .relationships_created
                    .entry(kind.as_label().to_string())
                    .or_insert(0) += 1;
            }
        }
    }

    /// All decisions taken
    pub fn decisions(&self) -> u64 {
        self.created + self.merged + self.skipped + self.rejected + self.failed + self.deferred
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "knowledge graph update summary")?;
        writeln!(
            f,
            "  documents processed: {} (failed: {}, deferred: {})",
            self.documents_processed, self.documents_failed, self.documents_deferred
        )?;
        writeln!(
            f,
            "  created: {}  merged: {}  skipped: {}  rejected: {}  failed: {}  deferred: {}",
            self.created, self.merged, self.skipped, self.rejected, self.failed, self.deferred
        )?;
        if !self.entities_created.is_empty() {
            writeln!(f, "  new entities by type:")?;
            for (label, count) in &self.entities_created {
                writeln!(f, "    {label}: {count}")?;
            }
        }
        if !self.relationships_created.is_empty() {
            writeln!(f, "  new relationships by kind:")?;
            for (label, count) in &self.relationships_created {
                writeln!(f, "    {label}: {count}")?;
            }
        }
        Ok(())
    }
}

/// Everything a batch run produced: counts plus the full audit trail
#[derive(Debug, Default)]
pub struct RunReport {
    pub summary: RunSummary,
    pub audit: AuditLog,
}
