//! Store trait definitions

use crate::graph::{EdgeId, Entity, EntityKey, EntityType, RelationKind, Relationship};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur at the store boundary
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness invariant was violated, usually by a concurrent
    /// writer. The caller should re-resolve and retry as a merge.
    #[error("Uniqueness conflict: {0}")]
    Conflict(String),

    /// The store cannot be reached. Batch processing halts on this.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A store call exceeded its deadline on every retry.
    #[error("Store call timed out after {0} attempts")]
    Timeout(u32),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for graph storage backends.
///
/// Implementations must be thread-safe (Send + Sync) to support
/// concurrent access from multiple tasks, and must enforce the graph's
/// uniqueness invariants themselves: one entity per (type, canonical
/// name), one owner per external identifier, one relationship per
/// endpoint pair and kind. A write that would break one of these fails
/// with [`StoreError::Conflict`] instead of succeeding silently.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Look up an entity by its canonical identity.
    async fn find_node(
        &self,
        entity_type: EntityType,
        canonical_name: &str,
    ) -> StoreResult<Option<Entity>>;

    /// Look up the entity owning an external identifier.
    async fn find_node_by_external_id(
        &self,
        namespace: &str,
        id: &str,
    ) -> StoreResult<Option<Entity>>;

    /// Look up a relationship by exact (source, target, kind).
    ///
    /// Only the given ordering is checked; symmetric lookups are the
    /// duplicate checker's concern.
    async fn find_edge(
        &self,
        source: &EntityKey,
        target: &EntityKey,
        kind: RelationKind,
    ) -> StoreResult<Option<Relationship>>;

    /// Write an entity, keyed by `entity.key` (insert or full replace).
    async fn upsert_node(&self, entity: &Entity) -> StoreResult<EntityKey>;

    /// Write a relationship, keyed by `relationship.id` (insert or full
    /// replace).
    async fn upsert_edge(&self, relationship: &Relationship) -> StoreResult<EdgeId>;

    /// Entity counts per type, for reporting.
    async fn count_nodes(&self) -> StoreResult<Vec<(EntityType, u64)>>;

    /// Relationship counts per kind, for reporting.
    async fn count_edges(&self) -> StoreResult<Vec<(RelationKind, u64)>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StoreResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StoreResult<Self>;
}
