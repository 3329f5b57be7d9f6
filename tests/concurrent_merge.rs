//! Concurrent merging against one shared store
//!
//! Many tasks pushing overlapping candidates through a shared
//! coordinator must never produce duplicate rows: exactly one task
//! creates, the rest merge.

mod common;

use common::{entity, relation};
use medulla::{
    Decision, DocumentFacts, EntityKey, EntityType, ExternalId, GraphStore, MemoryStore,
    MergeConfig, MergeCoordinator,
};
use std::sync::Arc;
use tokio::task::JoinSet;

#[tokio::test]
async fn many_tasks_same_candidate_create_exactly_once() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = Arc::new(MergeCoordinator::new(
        store.clone(),
        &MergeConfig::default(),
    ));

    let mut join_set: JoinSet<Decision> = JoinSet::new();
    for task in 0..16 {
        let coordinator = coordinator.clone();
        join_set.spawn(async move {
            let doc = format!("PMID:{task}");
            let record = coordinator
                .merge_entity(&entity("Aspirin", "drug", &doc))
                .await
                .unwrap();
            record.decision
        });
    }

    let mut created = 0;
    let mut merged = 0;
    while let Some(result) = join_set.join_next().await {
        match result.unwrap() {
            Decision::Created => created += 1,
            Decision::Merged => merged += 1,
            other => panic!("unexpected decision {other}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(merged, 15);
    assert_eq!(store.node_count(), 1);
    let aspirin = store
        .node(&EntityKey::derive(EntityType::Drug, "aspirin"))
        .unwrap();
    assert_eq!(aspirin.sources.len(), 16);
    assert!(aspirin.confidence < 1.0);
}

#[tokio::test]
async fn interleaved_orientations_share_one_edge() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = Arc::new(MergeCoordinator::new(
        store.clone(),
        &MergeConfig::default(),
    ));
    for name in ["TP53", "MDM2"] {
        coordinator
            .merge_entity(&entity(name, "gene", "PMID:300"))
            .await
            .unwrap();
    }

    let mut join_set: JoinSet<Decision> = JoinSet::new();
    for task in 0..8 {
        let coordinator = coordinator.clone();
        join_set.spawn(async move {
            let doc = format!("PMID:{}", 300 + task);
            let (a, b) = if task % 2 == 0 {
                ("TP53", "MDM2")
            } else {
                ("MDM2", "TP53")
            };
            let records = coordinator
                .merge_relation(&relation("PPI", (a, "gene"), (b, "gene"), &doc))
                .await
                .unwrap();
            records.last().unwrap().decision
        });
    }

    let mut created = 0;
    while let Some(result) = join_set.join_next().await {
        if result.unwrap() == Decision::Created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(store.node_count(), 2);
    assert_eq!(store.edge_count(), 1);
}

#[tokio::test]
async fn convergent_external_id_claims_settle_on_one_row() {
    // run a few rounds to catch different interleavings
    for round in 0..10 {
        let store = Arc::new(MemoryStore::new());
        let coordinator = Arc::new(MergeCoordinator::new(
            store.clone(),
            &MergeConfig::default(),
        ));

        let mut join_set: JoinSet<Decision> = JoinSet::new();
        for name in ["Aspirin", "Acetylsalicylic Acid"] {
            let coordinator = coordinator.clone();
            let candidate = entity(name, "drug", &format!("PMID:{round}"))
                .with_external_id(ExternalId::new("ncbi_mesh", "D001241"));
            join_set.spawn(async move {
                coordinator.merge_entity(&candidate).await.unwrap().decision
            });
        }

        let mut created = 0;
        let mut merged = 0;
        while let Some(result) = join_set.join_next().await {
            match result.unwrap() {
                Decision::Created => created += 1,
                Decision::Merged => merged += 1,
                other => panic!("unexpected decision {other}"),
            }
        }

        assert_eq!((created, merged), (1, 1));
        assert_eq!(store.node_count(), 1);
        let survivor = store
            .find_node_by_external_id("ncbi_mesh", "D001241")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(survivor.sources.len(), 2);
        assert_eq!(
            survivor.external_ids,
            vec![ExternalId::new("ncbi_mesh", "D001241")]
        );
    }
}

#[tokio::test]
async fn parallel_documents_never_duplicate_rows() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = Arc::new(MergeCoordinator::new(
        store.clone(),
        &MergeConfig::default(),
    ));

    let mut join_set = JoinSet::new();
    for task in 0..4 {
        let coordinator = coordinator.clone();
        join_set.spawn(async move {
            let id = format!("PMID:{}", 400 + task);
            let mut doc = DocumentFacts::new(&id);
            doc.entities.push(entity("Warfarin", "drug", &id));
            doc.entities.push(entity("Aspirin", "drug", &id));
            doc.relations
                .push(relation("DDI", ("Warfarin", "drug"), ("Aspirin", "drug"), &id));
            coordinator.process_batch(&[doc]).await
        });
    }

    let mut created = 0;
    let mut merged = 0;
    while let Some(result) = join_set.join_next().await {
        let report = result.unwrap();
        assert_eq!(report.summary.rejected, 0);
        assert_eq!(report.summary.deferred, 0);
        created += report.summary.created;
        merged += report.summary.merged;
    }

    // two entities and one relationship exist exactly once each
    assert_eq!(created, 3);
    assert_eq!(merged, 9);
    assert_eq!(store.node_count(), 2);
    assert_eq!(store.edge_count(), 1);
}
