//! Per-identity advisory locks serializing merge decisions
//!
//! The read-decide-write cycle for a candidate is only safe if no other
//! task is deciding about the same identity at the same time. Entity
//! work locks the canonical (type, name) identity, which exists before
//! any row does; relationship work locks both resolved endpoint keys in
//! sorted order so overlapping pairs cannot deadlock.

use crate::graph::{EntityKey, EntityType};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LockKey {
    Identity(EntityType, String),
    Entity(EntityKey),
}

/// Advisory lock table. Entries are created on first use and kept for
/// the engine's lifetime.
#[derive(Default)]
pub struct KeyLocks {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn acquire(&self, key: LockKey) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Serialize all entity work on one canonical identity.
    pub async fn lock_identity(
        &self,
        entity_type: EntityType,
        canonical_name: &str,
    ) -> OwnedMutexGuard<()> {
        self.acquire(LockKey::Identity(entity_type, canonical_name.to_string()))
            .await
    }

    /// Serialize relationship work touching a pair of resolved entities.
    pub async fn lock_pair(&self, a: EntityKey, b: EntityKey) -> PairGuard {
        let (first, second) = if b < a { (b, a) } else { (a, b) };
        let first_guard = self.acquire(LockKey::Entity(first)).await;
        let second_guard = if first == second {
            None
        } else {
            Some(self.acquire(LockKey::Entity(second)).await)
        };
        PairGuard {
            _first: first_guard,
            _second: second_guard,
        }
    }
}

/// Guards for both endpoints of a relationship write
pub struct PairGuard {
    _first: OwnedMutexGuard<()>,
    _second: Option<OwnedMutexGuard<()>>,
}
