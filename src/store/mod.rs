//! Storage backends for the knowledge graph

mod memory;
mod retry;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use retry::{RetryPolicy, RetryingStore};
pub use sqlite::SqliteStore;
pub use traits::{GraphStore, OpenStore, StoreError, StoreResult};
