//!
//! goalmusic storage module
//! ------------------------
//! Document store adapter for the `users` collection. The HTTP layer only
//! talks to the `UserCollection` trait; `MemoryCollection` is the bundled
//! implementation (in-process, optionally persisted to a JSON snapshot file).
//!
//! Every operation is atomic for a single record. There are no multi-record
//! transactions: a lookup followed by a mutation is two independent calls and
//! callers must treat a mismatched row count as a lost race.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ids::IdSet;
use crate::models::{FieldMask, UserRecord};

pub mod memory;

pub use memory::MemoryCollection;

/// Result of an upsert: whether a new record was created or an existing one replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Matched,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Async access to the user collection.
#[async_trait]
pub trait UserCollection: Send + Sync {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<UserRecord>>;

    /// Records for the ids in `ids` that exist, in id-set order. Unknown ids are skipped.
    async fn find_by_ids(&self, ids: &IdSet) -> StoreResult<Vec<UserRecord>>;

    /// Insert `record` if its id is unseen, otherwise replace the stored record.
    async fn upsert(&self, record: UserRecord) -> StoreResult<UpsertOutcome>;

    /// Apply `mask` to the record with `id`. Returns the number of records modified (0 or 1).
    async fn update_fields(&self, id: &str, mask: &FieldMask) -> StoreResult<u64>;

    async fn delete_one(&self, id: &str) -> StoreResult<u64>;

    async fn delete_many(&self, ids: &IdSet) -> StoreResult<u64>;

    /// Persist anything not yet durable. Called at shutdown; implementations
    /// may persist in the background in between.
    async fn flush(&self) -> StoreResult<()>;
}

/// Cheaply clonable handle to the application's collection.
#[derive(Clone)]
pub struct SharedCollection(pub Arc<dyn UserCollection>);

impl SharedCollection {
    pub fn new<C: UserCollection + 'static>(collection: C) -> Self {
        Self(Arc::new(collection))
    }

    /// Volatile collection, used when no data file is configured.
    pub fn in_memory() -> Self {
        Self::new(MemoryCollection::new())
    }
}

impl std::ops::Deref for SharedCollection {
    type Target = dyn UserCollection;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod storage_tests;
