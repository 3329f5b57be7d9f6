//! Deadline and retry enforcement around a graph store
//!
//! Every store call gets a bounded timeout. A call that times out is
//! retried with exponential backoff; when the attempts are exhausted
//! the call fails with [`StoreError::Timeout`]. Other errors pass
//! through untouched, so conflicts and unavailability keep their
//! meaning for the coordinator.

use super::traits::{GraphStore, StoreError, StoreResult};
use crate::graph::{EdgeId, Entity, EntityKey, EntityType, RelationKind, Relationship};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Deadline and backoff settings for store calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Per-call deadline
    pub timeout: Duration,
    /// Total attempts per call (at least 1)
    pub attempts: u32,
    /// Delay before the first retry; doubles per attempt
    pub backoff: Duration,
    /// Upper bound on the retry delay
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            attempts: 3,
            backoff: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based)
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        (self.backoff * factor).min(self.backoff_cap)
    }
}

/// Store wrapper applying a [`RetryPolicy`] to every call
pub struct RetryingStore {
    inner: Arc<dyn GraphStore>,
    policy: RetryPolicy,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn GraphStore>, policy: RetryPolicy) -> Self {
        let policy = RetryPolicy {
            attempts: policy.attempts.max(1),
            ..policy
        };
        Self { inner, policy }
    }

    async fn with_retry<T, Fut>(
        &self,
        op: &'static str,
        mut call: impl FnMut() -> Fut,
    ) -> StoreResult<T>
    where
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match tokio::time::timeout(self.policy.timeout, call()).await {
                Ok(result) => return result,
                Err(_) => {
                    attempt += 1;
                    if attempt >= self.policy.attempts {
                        warn!(op, attempts = attempt, "store call timed out, giving up");
                        return Err(StoreError::Timeout(attempt));
                    }
                    let delay = self.policy.delay(attempt - 1);
                    warn!(
                        op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "store call timed out, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl GraphStore for RetryingStore {
    async fn find_node(
        &self,
        entity_type: EntityType,
        canonical_name: &str,
    ) -> StoreResult<Option<Entity>> {
        self.with_retry("find_node", || {
            self.inner.find_node(entity_type, canonical_name)
        })
        .await
    }

    async fn find_node_by_external_id(
        &self,
        namespace: &str,
        id: &str,
    ) -> StoreResult<Option<Entity>> {
        self.with_retry("find_node_by_external_id", || {
            self.inner.find_node_by_external_id(namespace, id)
        })
        .await
    }

    async fn find_edge(
        &self,
        source: &EntityKey,
        target: &EntityKey,
        kind: RelationKind,
    ) -> StoreResult<Option<Relationship>> {
        self.with_retry("find_edge", || self.inner.find_edge(source, target, kind))
            .await
    }

    async fn upsert_node(&self, entity: &Entity) -> StoreResult<EntityKey> {
        self.with_retry("upsert_node", || self.inner.upsert_node(entity))
            .await
    }

    async fn upsert_edge(&self, relationship: &Relationship) -> StoreResult<EdgeId> {
        self.with_retry("upsert_edge", || self.inner.upsert_edge(relationship))
            .await
    }

    async fn count_nodes(&self) -> StoreResult<Vec<(EntityType, u64)>> {
        self.with_retry("count_nodes", || self.inner.count_nodes())
            .await
    }

    async fn count_edges(&self) -> StoreResult<Vec<(RelationKind, u64)>> {
        self.with_retry("count_edges", || self.inner.count_edges())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Stalls the first `stalls` find_node calls past any deadline
    struct StallingStore {
        calls: AtomicU32,
        stalls: u32,
    }

    impl StallingStore {
        fn new(stalls: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                stalls,
            }
        }
    }

    #[async_trait]
    impl GraphStore for StallingStore {
        async fn find_node(
            &self,
            _entity_type: EntityType,
            _canonical_name: &str,
        ) -> StoreResult<Option<Entity>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.stalls {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(None)
        }

        async fn find_node_by_external_id(
            &self,
            _namespace: &str,
            _id: &str,
        ) -> StoreResult<Option<Entity>> {
            Ok(None)
        }

        async fn find_edge(
            &self,
            _source: &EntityKey,
            _target: &EntityKey,
            _kind: RelationKind,
        ) -> StoreResult<Option<Relationship>> {
            Ok(None)
        }

        async fn upsert_node(&self, entity: &Entity) -> StoreResult<EntityKey> {
            Ok(entity.key)
        }

        async fn upsert_edge(&self, relationship: &Relationship) -> StoreResult<EdgeId> {
            Ok(relationship.id)
        }

        async fn count_nodes(&self) -> StoreResult<Vec<(EntityType, u64)>> {
            Ok(Vec::new())
        }

        async fn count_edges(&self) -> StoreResult<Vec<(RelationKind, u64)>> {
            Ok(Vec::new())
        }
    }

    fn tight_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(20),
            attempts,
            backoff: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn recovers_when_a_retry_gets_through() {
        let inner = Arc::new(StallingStore::new(1));
        let store = RetryingStore::new(inner.clone(), tight_policy(3));
        let found = store.find_node(EntityType::Drug, "aspirin").await.unwrap();
        assert!(found.is_none());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_as_timeout() {
        let inner = Arc::new(StallingStore::new(u32::MAX));
        let store = RetryingStore::new(inner.clone(), tight_policy(3));
        let err = store
            .find_node(EntityType::Drug, "aspirin")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(3)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_timeout_errors_pass_through_without_retry() {
        struct FailingStore;

        #[async_trait]
        impl GraphStore for FailingStore {
            async fn find_node(
                &self,
                _entity_type: EntityType,
                _canonical_name: &str,
            ) -> StoreResult<Option<Entity>> {
                Err(StoreError::Unavailable("connection refused".to_string()))
            }

            async fn find_node_by_external_id(
                &self,
                _namespace: &str,
                _id: &str,
            ) -> StoreResult<Option<Entity>> {
                Ok(None)
            }

            async fn find_edge(
                &self,
                _source: &EntityKey,
                _target: &EntityKey,
                _kind: RelationKind,
            ) -> StoreResult<Option<Relationship>> {
                Ok(None)
            }

            async fn upsert_node(&self, entity: &Entity) -> StoreResult<EntityKey> {
                Ok(entity.key)
            }

            async fn upsert_edge(&self, relationship: &Relationship) -> StoreResult<EdgeId> {
                Ok(relationship.id)
            }

            async fn count_nodes(&self) -> StoreResult<Vec<(EntityType, u64)>> {
                Ok(Vec::new())
            }

            async fn count_edges(&self) -> StoreResult<Vec<(RelationKind, u64)>> {
                Ok(Vec::new())
            }
        }

        let store = RetryingStore::new(Arc::new(FailingStore), tight_policy(3));
        let err = store
            .find_node(EntityType::Drug, "aspirin")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy {
            timeout: Duration::from_secs(5),
            attempts: 5,
            backoff: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(1),
        };
        assert_eq!(policy.delay(0), Duration::from_millis(250));
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_secs(1));
        assert_eq!(policy.delay(10), Duration::from_secs(1));
    }
}
