//! The merge coordinator: one decision per candidate fact
//!
//! Candidates flow through normalization, resolution and validation
//! into exactly one of create, merge, skip or reject, each leaving an
//! audit record. Anything recoverable (unknown vocabulary, identity
//! conflicts, store timeouts) becomes a record; only a failing store
//! surfaces as an error and halts the batch.

use super::audit::{AuditLog, AuditReason, AuditRecord, Decision, RunReport, RunSummary};
use super::confidence::{ConfidenceAggregator, ConfidenceModel};
use super::duplicate::DuplicateChecker;
use super::locks::KeyLocks;
use super::normalize::{canonical_name, Normalizer};
use super::resolve::{IdentityResolver, Resolution};
use super::validate::{Orientation, RelationshipValidator};
use crate::config::{MergeConfig, TierWeights};
use crate::graph::{Entity, EntityKey, EntityType, ExternalId, ProvenanceRecord, Relationship};
use crate::ingest::{DocumentFacts, EndpointRef, EntityCandidate, RelationCandidate};
use crate::store::{GraphStore, RetryingStore, StoreError, StoreResult};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Resolution can land on a different identity than the one locked
/// (an external id owned by another name). The loop re-locks there; id
/// ownership never moves, so one move settles it. The bound caps the
/// pathological case.
const MAX_RESOLVE_PASSES: usize = 3;

/// Failures that stop candidate processing outright.
///
/// Everything recoverable ends in an audit record instead. An error
/// here means the store itself has failed and the remaining batch
/// cannot proceed.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("store failure: {0}")]
    Store(#[source] StoreError),
}

impl MergeError {
    fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(detail) => MergeError::StoreUnavailable(detail),
            other => MergeError::Store(other),
        }
    }
}

/// Outcome of pinning a relationship endpoint to an entity key
enum EndpointResolution {
    Key(EntityKey),
    Unmergeable(AuditReason),
}

/// Runs candidate facts through the merge pipeline.
///
/// The coordinator owns the decision flow; the parts it composes each
/// do one thing (normalize, resolve, validate, check duplicates, fold
/// confidence). All store access goes through a retrying wrapper so
/// every call carries a deadline. Methods take `&self` and the
/// coordinator is meant to be shared behind an [`Arc`] across tasks;
/// per-identity locks serialize the read-decide-write cycle.
pub struct MergeCoordinator {
    store: Arc<dyn GraphStore>,
    normalizer: Normalizer,
    validator: RelationshipValidator,
    resolver: IdentityResolver,
    duplicates: DuplicateChecker,
    aggregator: ConfidenceAggregator,
    weights: TierWeights,
    locks: KeyLocks,
    create_missing_endpoints: bool,
}

impl MergeCoordinator {
    pub fn new(store: Arc<dyn GraphStore>, config: &MergeConfig) -> Self {
        let store: Arc<dyn GraphStore> =
            Arc::new(RetryingStore::new(store, config.retry_policy()));
        Self {
            normalizer: Normalizer::new(config),
            validator: RelationshipValidator::new(config),
            resolver: IdentityResolver::new(store.clone()),
            duplicates: DuplicateChecker::new(store.clone()),
            aggregator: ConfidenceAggregator::independent(),
            weights: config.tier_weights.clone(),
            locks: KeyLocks::new(),
            create_missing_endpoints: config.create_missing_endpoints,
            store,
        }
    }

    /// Swap in a different confidence combination rule.
    pub fn with_model(mut self, model: Arc<dyn ConfidenceModel>) -> Self {
        self.aggregator = ConfidenceAggregator::new(model);
        self
    }

    /// Decide one entity candidate.
    ///
    /// Returns the audit record for the decision. `Err` means the store
    /// failed and the caller should stop submitting candidates.
    pub async fn merge_entity(
        &self,
        candidate: &EntityCandidate,
    ) -> Result<AuditRecord, MergeError> {
        let document = candidate.provenance.document.as_deref();

        let Some(entity_type) = self.normalizer.entity_type(&candidate.raw_type) else {
            return Ok(rejected(
                format!("{} {}", candidate.raw_type, candidate.raw_name),
                AuditReason::UnknownEntityType {
                    raw: candidate.raw_type.clone(),
                },
                document,
            ));
        };
        let name = canonical_name(&candidate.raw_name);
        if name.is_empty() {
            return Ok(rejected(
                format!("{} {}", entity_type, candidate.raw_name),
                AuditReason::EmptyName,
                document,
            ));
        }

        match self
            .apply_entity(
                entity_type,
                &name,
                &candidate.raw_name,
                candidate.external_id.as_ref(),
                &candidate.provenance,
            )
            .await
        {
            Ok(record) => Ok(record),
            Err(StoreError::Timeout(attempts)) => Ok(AuditRecord::new(
                Decision::Failed,
                format!("{entity_type} {name}"),
            )
            .with_reason(AuditReason::StoreTimeout { attempts })
            .with_document(document)),
            Err(err) => Err(MergeError::from_store(err)),
        }
    }

    /// Decide one relationship candidate.
    ///
    /// Returns one record per decision taken: endpoint entities created
    /// on the way (when configured) come first, the relationship's own
    /// record last. `Err` means the store failed.
    pub async fn merge_relation(
        &self,
        candidate: &RelationCandidate,
    ) -> Result<Vec<AuditRecord>, MergeError> {
        let mut records = Vec::new();
        match self.apply_relation(candidate, &mut records).await {
            Ok(()) => Ok(records),
            Err(StoreError::Timeout(attempts)) => {
                records.push(
                    AuditRecord::new(Decision::Failed, relation_subject(candidate))
                        .with_reason(AuditReason::StoreTimeout { attempts })
                        .with_document(candidate.provenance.document.as_deref()),
                );
                Ok(records)
            }
            Err(err) => Err(MergeError::from_store(err)),
        }
    }

    /// Run every candidate in a document, entities before relationships.
    ///
    /// Records land in `audit` and are folded into `summary`. On a store
    /// failure the remaining candidates of this document are marked
    /// deferred before the error is returned.
    pub async fn process_document(
        &self,
        facts: &DocumentFacts,
        audit: &mut AuditLog,
        summary: &mut RunSummary,
    ) -> Result<(), MergeError> {
        info!(
            document = %facts.document_id,
            entities = facts.entities.len(),
            relations = facts.relations.len(),
            "processing document"
        );

        for (index, candidate) in facts.entities.iter().enumerate() {
            match self.merge_entity(candidate).await {
                Ok(record) => {
                    summary.observe(&record);
                    audit.push(record);
                }
                Err(err) => {
                    defer_entities(&facts.entities[index..], audit, summary);
                    defer_relations(&facts.relations, audit, summary);
                    return Err(err);
                }
            }
        }
        for (index, candidate) in facts.relations.iter().enumerate() {
            match self.merge_relation(candidate).await {
                Ok(records) => {
                    for record in records {
                        summary.observe(&record);
                        audit.push(record);
                    }
                }
                Err(err) => {
                    defer_relations(&facts.relations[index..], audit, summary);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Run a whole batch of documents sequentially.
    ///
    /// A store failure halts the batch; every candidate not yet decided
    /// is marked deferred, the halting document counts as failed and the
    /// untouched ones as deferred, so the report accounts for all of them.
    pub async fn process_batch(&self, documents: &[DocumentFacts]) -> RunReport {
        let mut report = RunReport::default();
        for (index, facts) in documents.iter().enumerate() {
            match self
                .process_document(facts, &mut report.audit, &mut report.summary)
                .await
            {
                Ok(()) => report.summary.documents_processed += 1,
                Err(err) => {
                    error!(error = %err, document = %facts.document_id, "halting batch");
                    report.summary.documents_failed += 1;
                    for later in &documents[index + 1..] {
                        report.summary.documents_deferred += 1;
                        defer_entities(&later.entities, &mut report.audit, &mut report.summary);
                        defer_relations(&later.relations, &mut report.audit, &mut report.summary);
                    }
                    break;
                }
            }
        }
        info!(
            created = report.summary.created,
            merged = report.summary.merged,
            skipped = report.summary.skipped,
            rejected = report.summary.rejected,
            failed = report.summary.failed,
            deferred = report.summary.deferred,
            "batch complete"
        );
        report
    }

    /// The locked read-decide-write cycle for one canonical entity claim.
    async fn apply_entity(
        &self,
        entity_type: EntityType,
        name: &str,
        raw_name: &str,
        external_id: Option<&ExternalId>,
        provenance: &ProvenanceRecord,
    ) -> StoreResult<AuditRecord> {
        let document = provenance.document.as_deref();
        let weight = self.weights.weight(provenance.tier);
        let mut identity = (entity_type, name.to_string());

        for _ in 0..MAX_RESOLVE_PASSES {
            let _guard = self.locks.lock_identity(identity.0, &identity.1).await;

            let resolved = match self.resolver.resolve(entity_type, name, external_id).await? {
                Resolution::Conflict { by_id, by_name } => {
                    return Ok(rejected(
                        format!("{entity_type} {name}"),
                        AuditReason::IdentityConflict {
                            by_external_id: by_id.key,
                            by_name: by_name.key,
                        },
                        document,
                    ));
                }
                Resolution::NotFound => {
                    if (identity.0, identity.1.as_str()) != (entity_type, name) {
                        identity = (entity_type, name.to_string());
                        continue;
                    }
                    None
                }
                Resolution::Existing(found) => {
                    if found.entity_type != identity.0 || found.canonical_name != identity.1 {
                        identity = (found.entity_type, found.canonical_name.clone());
                        continue;
                    }
                    Some(found)
                }
            };

            let (mut entity, decision) = match resolved {
                Some(existing) => (existing, Decision::Merged),
                None => (Entity::new(entity_type, name), Decision::Created),
            };
            entity.add_alias(raw_name);
            if let Some(id) = external_id {
                entity.add_external_id(id.clone());
            }
            let delta = self
                .aggregator
                .reinforce_entity(&mut entity, provenance.clone(), weight);

            match self.store.upsert_node(&entity).await {
                Ok(key) => {
                    debug!(
                        entity = %entity.canonical_name,
                        entity_type = %entity.entity_type,
                        decision = %decision,
                        confidence = entity.confidence,
                        "entity decided"
                    );
                    return Ok(AuditRecord::new(
                        decision,
                        format!("{} {}", entity.entity_type, entity.canonical_name),
                    )
                    .with_entity(entity.entity_type, key)
                    .with_confidence(delta.before, delta.after)
                    .with_document(document));
                }
                Err(StoreError::Conflict(detail)) => {
                    warn!(detail = %detail, "entity write conflicted, re-resolving");
                    match self.resolver.resolve(entity_type, name, external_id).await? {
                        Resolution::Existing(found)
                            if found.entity_type != identity.0
                                || found.canonical_name != identity.1 =>
                        {
                            identity = (found.entity_type, found.canonical_name.clone());
                            continue;
                        }
                        Resolution::Conflict { by_id, by_name } => {
                            return Ok(rejected(
                                format!("{entity_type} {name}"),
                                AuditReason::IdentityConflict {
                                    by_external_id: by_id.key,
                                    by_name: by_name.key,
                                },
                                document,
                            ));
                        }
                        _ => {
                            return Ok(rejected(
                                format!("{entity_type} {name}"),
                                AuditReason::UnresolvedStoreConflict,
                                document,
                            ));
                        }
                    }
                }
                Err(other) => return Err(other),
            }
        }

        Ok(rejected(
            format!("{entity_type} {name}"),
            AuditReason::UnresolvedStoreConflict,
            document,
        ))
    }

    async fn apply_relation(
        &self,
        candidate: &RelationCandidate,
        records: &mut Vec<AuditRecord>,
    ) -> StoreResult<()> {
        let document = candidate.provenance.document.as_deref();

        let Some(kind) = self.validator.kind(&candidate.raw_kind) else {
            records.push(rejected(
                relation_subject(candidate),
                AuditReason::UnknownRelationshipType {
                    raw: candidate.raw_kind.clone(),
                },
                document,
            ));
            return Ok(());
        };

        let (source_name, source_type) = match self.normalized_endpoint(&candidate.source) {
            Ok(normalized) => normalized,
            Err(reason) => {
                records.push(rejected(relation_subject(candidate), reason, document));
                return Ok(());
            }
        };
        let (target_name, target_type) = match self.normalized_endpoint(&candidate.target) {
            Ok(normalized) => normalized,
            Err(reason) => {
                records.push(rejected(relation_subject(candidate), reason, document));
                return Ok(());
            }
        };

        // Endpoint types are checked before any store access; resolution
        // can only move an endpoint within the gene/protein pool, which
        // every signature treats uniformly.
        let Some(orientation) = self.validator.check_endpoints(kind, source_type, target_type)
        else {
            records.push(rejected(
                relation_subject(candidate),
                AuditReason::TypeMismatch {
                    kind,
                    source: source_type,
                    target: target_type,
                },
                document,
            ));
            return Ok(());
        };

        let mut source = (&candidate.source, source_name, source_type);
        let mut target = (&candidate.target, target_name, target_type);
        if orientation == Orientation::Reversed {
            std::mem::swap(&mut source, &mut target);
        }
        let subject = format!("{} {} - {}", kind, source.1, target.1);

        let source_key = match self
            .endpoint_key(source.0, &source.1, source.2, &candidate.provenance, records)
            .await?
        {
            EndpointResolution::Key(key) => key,
            EndpointResolution::Unmergeable(reason) => {
                records.push(rejected(subject, reason, document));
                return Ok(());
            }
        };
        let target_key = match self
            .endpoint_key(target.0, &target.1, target.2, &candidate.provenance, records)
            .await?
        {
            EndpointResolution::Key(key) => key,
            EndpointResolution::Unmergeable(reason) => {
                records.push(rejected(subject, reason, document));
                return Ok(());
            }
        };

        if source_key == target_key {
            debug!(subject = %subject, "endpoints resolved to one entity, skipping");
            records.push(
                AuditRecord::new(Decision::Skipped, subject)
                    .with_reason(AuditReason::SelfLoopAfterResolution)
                    .with_document(document),
            );
            return Ok(());
        }

        let _guard = self.locks.lock_pair(source_key, target_key).await;
        let weight = self.weights.weight(candidate.provenance.tier);

        for _ in 0..2 {
            let existing = self.duplicates.existing(&source_key, &target_key, kind).await?;
            let (mut relationship, decision) = match existing {
                Some(found) => (found, Decision::Merged),
                None => (Relationship::new(source_key, target_key, kind), Decision::Created),
            };
            let delta = self.aggregator.reinforce_relationship(
                &mut relationship,
                candidate.provenance.clone(),
                weight,
            );

            match self.store.upsert_edge(&relationship).await {
                Ok(id) => {
                    debug!(
                        subject = %subject,
                        decision = %decision,
                        confidence = relationship.confidence,
                        "relationship decided"
                    );
                    records.push(
                        AuditRecord::new(decision, subject)
                            .with_edge(kind, id)
                            .with_confidence(delta.before, delta.after)
                            .with_document(document),
                    );
                    return Ok(());
                }
                Err(StoreError::Conflict(detail)) => {
                    warn!(detail = %detail, "relationship write conflicted, re-checking");
                    continue;
                }
                Err(other) => return Err(other),
            }
        }

        records.push(rejected(
            subject,
            AuditReason::UnresolvedStoreConflict,
            document,
        ));
        Ok(())
    }

    fn normalized_endpoint(&self, endpoint: &EndpointRef) -> Result<(String, EntityType), AuditReason> {
        let Some(entity_type) = self.normalizer.entity_type(&endpoint.raw_type) else {
            return Err(AuditReason::UnknownEntityType {
                raw: endpoint.raw_type.clone(),
            });
        };
        let name = canonical_name(&endpoint.raw_name);
        if name.is_empty() {
            return Err(AuditReason::EmptyName);
        }
        Ok((name, entity_type))
    }

    /// Pin an endpoint to an entity key, creating the entity when the
    /// engine is configured to and it does not exist yet.
    async fn endpoint_key(
        &self,
        endpoint: &EndpointRef,
        name: &str,
        entity_type: EntityType,
        provenance: &ProvenanceRecord,
        records: &mut Vec<AuditRecord>,
    ) -> StoreResult<EndpointResolution> {
        let mut resolution = self
            .resolver
            .resolve(entity_type, name, endpoint.external_id.as_ref())
            .await?;

        // Extraction sections file everything proteinoid under "gene"
        // while relationship payloads say "protein" (and vice versa),
        // so a miss retries the name under the sibling type before the
        // endpoint counts as missing.
        if let (Resolution::NotFound, Some(sibling)) =
            (&resolution, entity_type.proteinoid_sibling())
        {
            resolution = self
                .resolver
                .resolve(sibling, name, endpoint.external_id.as_ref())
                .await?;
        }

        match resolution {
            Resolution::Existing(found) => Ok(EndpointResolution::Key(found.key)),
            Resolution::Conflict { by_id, by_name } => {
                Ok(EndpointResolution::Unmergeable(AuditReason::IdentityConflict {
                    by_external_id: by_id.key,
                    by_name: by_name.key,
                }))
            }
            Resolution::NotFound if self.create_missing_endpoints => {
                let record = self
                    .apply_entity(
                        entity_type,
                        name,
                        &endpoint.raw_name,
                        endpoint.external_id.as_ref(),
                        provenance,
                    )
                    .await?;
                let key = record.entity_key;
                let reason = record.reason.clone();
                records.push(record);
                match key {
                    Some(key) => Ok(EndpointResolution::Key(key)),
                    None => Ok(EndpointResolution::Unmergeable(reason.unwrap_or(
                        AuditReason::MissingEndpoint {
                            name: endpoint.raw_name.clone(),
                        },
                    ))),
                }
            }
            Resolution::NotFound => Ok(EndpointResolution::Unmergeable(
                AuditReason::MissingEndpoint {
                    name: endpoint.raw_name.clone(),
                },
            )),
        }
    }
}

fn rejected(subject: String, reason: AuditReason, document: Option<&str>) -> AuditRecord {
    warn!(subject = %subject, reason = %reason, "candidate rejected");
    AuditRecord::new(Decision::Rejected, subject)
        .with_reason(reason)
        .with_document(document)
}

fn relation_subject(candidate: &RelationCandidate) -> String {
    format!(
        "{} {} - {}",
        candidate.raw_kind, candidate.source.raw_name, candidate.target.raw_name
    )
}

fn defer_entities(candidates: &[EntityCandidate], audit: &mut AuditLog, summary: &mut RunSummary) {
    for candidate in candidates {
        let record = AuditRecord::new(
            Decision::Deferred,
            format!("{} {}", candidate.raw_type, candidate.raw_name),
        )
        .with_reason(AuditReason::StoreUnavailable)
        .with_document(candidate.provenance.document.as_deref());
        summary.observe(&record);
        audit.push(record);
    }
}

fn defer_relations(
    candidates: &[RelationCandidate],
    audit: &mut AuditLog,
    summary: &mut RunSummary,
) {
    for candidate in candidates {
        let record = AuditRecord::new(Decision::Deferred, relation_subject(candidate))
            .with_reason(AuditReason::StoreUnavailable)
            .with_document(candidate.provenance.document.as_deref());
        summary.observe(&record);
        audit.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SourceTier;
    use crate::store::MemoryStore;

    fn provenance() -> ProvenanceRecord {
        ProvenanceRecord::new("pubtator_extraction", SourceTier::AiExtracted)
            .with_document("PMID:1")
    }

    fn coordinator(store: Arc<MemoryStore>) -> MergeCoordinator {
        MergeCoordinator::new(store, &MergeConfig::default())
    }

    #[tokio::test]
    async fn entity_created_then_merged_under_alias() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = coordinator(store.clone());

        let record = coordinator
            .merge_entity(&EntityCandidate::new("Aspirin", "drug", provenance()))
            .await
            .unwrap();
        assert_eq!(record.decision, Decision::Created);
        assert!((record.confidence_after.unwrap() - 0.6).abs() < 1e-9);

        let record = coordinator
            .merge_entity(&EntityCandidate::new("  ASPIRIN ", "medication", provenance()))
            .await
            .unwrap();
        assert_eq!(record.decision, Decision::Merged);
        assert_eq!(store.node_count(), 1);

        let entity = store.node(&record.entity_key.unwrap()).unwrap();
        assert_eq!(entity.canonical_name, "aspirin");
        // second surface form is a case-insensitive duplicate of the first
        assert_eq!(entity.aliases, vec!["Aspirin"]);
        assert_eq!(entity.sources.len(), 2);
        assert!((entity.confidence - (1.0 - 0.4 * 0.4)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_entity_type_is_rejected_without_a_write() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = coordinator(store.clone());

        let record = coordinator
            .merge_entity(&EntityCandidate::new("Saturn", "planet", provenance()))
            .await
            .unwrap();
        assert_eq!(record.decision, Decision::Rejected);
        assert!(matches!(
            record.reason,
            Some(AuditReason::UnknownEntityType { .. })
        ));
        assert_eq!(store.node_count(), 0);
    }

    #[tokio::test]
    async fn unknown_relationship_kind_is_rejected_without_a_write() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = coordinator(store.clone());
        coordinator
            .merge_entity(&EntityCandidate::new("Aspirin", "drug", provenance()))
            .await
            .unwrap();
        coordinator
            .merge_entity(&EntityCandidate::new("Pain", "disease", provenance()))
            .await
            .unwrap();

        let candidate = RelationCandidate::new(
            "FOO_BAR",
            EndpointRef::new("Aspirin", "drug"),
            EndpointRef::new("Pain", "disease"),
            provenance(),
        );
        let records = coordinator.merge_relation(&candidate).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decision, Decision::Rejected);
        assert!(matches!(
            records[0].reason,
            Some(AuditReason::UnknownRelationshipType { .. })
        ));
        assert_eq!(store.edge_count(), 0);
    }

    #[tokio::test]
    async fn missing_endpoint_rejects_unless_creation_is_enabled() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = coordinator(store.clone());
        let candidate = RelationCandidate::new(
            "drug_disease_relationships",
            EndpointRef::new("Aspirin", "drug"),
            EndpointRef::new("Pain", "disease"),
            provenance(),
        );

        let records = coordinator.merge_relation(&candidate).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decision, Decision::Rejected);
        assert!(matches!(
            records[0].reason,
            Some(AuditReason::MissingEndpoint { ref name }) if name == "Aspirin"
        ));
        assert_eq!(store.node_count(), 0);

        let mut config = MergeConfig::default();
        config.create_missing_endpoints = true;
        let coordinator = MergeCoordinator::new(store.clone(), &config);
        let records = coordinator.merge_relation(&candidate).await.unwrap();
        // two endpoint creations, then the relationship itself
        assert_eq!(records.len(), 3);
        assert!(records[..2]
            .iter()
            .all(|r| r.decision == Decision::Created && r.entity_key.is_some()));
        assert_eq!(records[2].decision, Decision::Created);
        assert!(records[2].edge_id.is_some());
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
    }

    #[tokio::test]
    async fn reversed_directed_candidate_lands_in_canonical_direction() {
        let store = Arc::new(MemoryStore::new());
        let mut config = MergeConfig::default();
        config.create_missing_endpoints = true;
        let coordinator = MergeCoordinator::new(store.clone(), &config);

        // stated disease-first; DRUG_DISEASE_ASSOCIATION runs drug -> disease
        let candidate = RelationCandidate::new(
            "DRUG_DISEASE_ASSOCIATION",
            EndpointRef::new("Thrombosis", "disease"),
            EndpointRef::new("Warfarin", "drug"),
            provenance(),
        );
        let records = coordinator.merge_relation(&candidate).await.unwrap();
        let edge = store.edge(&records.last().unwrap().edge_id.unwrap()).unwrap();
        let warfarin = EntityKey::derive(EntityType::Drug, "warfarin");
        let thrombosis = EntityKey::derive(EntityType::Disease, "thrombosis");
        assert_eq!(edge.source, warfarin);
        assert_eq!(edge.target, thrombosis);
    }

    #[tokio::test]
    async fn endpoints_resolving_to_one_entity_skip_the_relationship() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = coordinator(store.clone());
        coordinator
            .merge_entity(&EntityCandidate::new("TP53", "protein", provenance()))
            .await
            .unwrap();

        let candidate = RelationCandidate::new(
            "protein_protein_relationships",
            EndpointRef::new("TP53", "protein"),
            EndpointRef::new("tp53", "protein"),
            provenance(),
        );
        let records = coordinator.merge_relation(&candidate).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decision, Decision::Skipped);
        assert!(matches!(
            records[0].reason,
            Some(AuditReason::SelfLoopAfterResolution)
        ));
        assert_eq!(store.edge_count(), 0);
    }

    #[tokio::test]
    async fn protein_endpoint_finds_the_gene_row() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = coordinator(store.clone());
        coordinator
            .merge_entity(&EntityCandidate::new("TP53", "gene_protein", provenance()))
            .await
            .unwrap();
        coordinator
            .merge_entity(&EntityCandidate::new("MDM2", "gene_protein", provenance()))
            .await
            .unwrap();

        // both rows exist as genes; the relationship payload says protein
        let candidate = RelationCandidate::new(
            "protein_protein_relationships",
            EndpointRef::new("TP53", "protein"),
            EndpointRef::new("MDM2", "protein"),
            provenance(),
        );
        let records = coordinator.merge_relation(&candidate).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decision, Decision::Created);
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
    }

    #[tokio::test]
    async fn type_mismatch_is_rejected_before_any_resolution() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = coordinator(store.clone());

        let candidate = RelationCandidate::new(
            "DDI",
            EndpointRef::new("Aspirin", "drug"),
            EndpointRef::new("Thrombosis", "disease"),
            provenance(),
        );
        let records = coordinator.merge_relation(&candidate).await.unwrap();
        assert_eq!(records[0].decision, Decision::Rejected);
        assert!(matches!(
            records[0].reason,
            Some(AuditReason::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn process_document_orders_entities_before_relations() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = coordinator(store.clone());

        let mut facts = DocumentFacts::new("PMID:1");
        facts.entities.push(EntityCandidate::new("Aspirin", "drug", provenance()));
        facts.entities.push(EntityCandidate::new("Pain", "disease", provenance()));
        facts.relations.push(RelationCandidate::new(
            "drug_disease_relationships",
            EndpointRef::new("Aspirin", "drug"),
            EndpointRef::new("Pain", "disease"),
            provenance(),
        ));

        let mut audit = AuditLog::new();
        let mut summary = RunSummary::default();
        coordinator
            .process_document(&facts, &mut audit, &mut summary)
            .await
            .unwrap();

        assert_eq!(summary.created, 3);
        assert_eq!(summary.rejected, 0);
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
    }

    #[tokio::test]
    async fn batch_report_accounts_for_every_candidate() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = coordinator(store.clone());

        let mut first = DocumentFacts::new("PMID:1");
        first.entities.push(EntityCandidate::new("Aspirin", "drug", provenance()));
        let mut second = DocumentFacts::new("PMID:2");
        second.entities.push(EntityCandidate::new("Saturn", "planet", provenance()));
        second.entities.push(EntityCandidate::new("Aspirin", "chemical", provenance()));

        let report = coordinator.process_batch(&[first, second]).await;
        assert_eq!(report.summary.documents_processed, 2);
        assert_eq!(report.summary.created, 1);
        assert_eq!(report.summary.merged, 1);
        assert_eq!(report.summary.rejected, 1);
        assert_eq!(report.summary.decisions(), report.audit.len() as u64);
    }
}
