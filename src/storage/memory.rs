use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{StoreError, StoreResult, UpsertOutcome, UserCollection};
use crate::ids::IdSet;
use crate::models::{FieldMask, UserRecord};

const SNAPSHOT_VERSION: u32 = 1;
const COLLECTION_NAME: &str = "users";

/// Default delay between background snapshots of a dirty collection.
pub const DEFAULT_PERSIST_INTERVAL: Duration = Duration::from_millis(1_000);

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    collection: String,
    records: Vec<UserRecord>,
}

struct Inner {
    records: RwLock<BTreeMap<String, UserRecord>>,
    snapshot: Option<PathBuf>,
    /// Set by every mutation, cleared when a snapshot is taken.
    dirty: AtomicBool,
    /// Serializes snapshot writers (background thread and `flush`) on the temp file.
    persist_lock: Mutex<()>,
}

impl Inner {
    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Copy the records under the read lock, then serialize and write with no
    /// collection lock held. Readers and writers only wait for the copy.
    fn persist(&self, path: &Path) -> StoreResult<usize> {
        let _writer = self.persist_lock.lock();
        self.dirty.store(false, Ordering::Release);
        let records: Vec<UserRecord> = self.records.read().values().cloned().collect();
        let count = records.len();
        let snap = Snapshot { version: SNAPSHOT_VERSION, collection: COLLECTION_NAME.to_string(), records };
        let result = serde_json::to_vec_pretty(&snap)
            .map_err(StoreError::from)
            .and_then(|bytes| {
                let tmp = path.with_extension("json.tmp");
                std::fs::write(&tmp, bytes)?;
                std::fs::rename(tmp, path)?;
                Ok(())
            });
        if let Err(e) = result {
            self.mark_dirty();
            return Err(e);
        }
        Ok(count)
    }
}

/// In-process user collection keyed by id.
///
/// With a snapshot path, mutations only mark the collection dirty; a
/// background thread writes the snapshot (temp file + rename) every
/// persist interval while dirty, and `flush` writes it on demand. Writes
/// made after the last snapshot are lost if the process dies without
/// flushing.
pub struct MemoryCollection {
    inner: Arc<Inner>,
}

impl Default for MemoryCollection {
    fn default() -> Self { Self::new() }
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::from_parts(BTreeMap::new(), None)
    }

    fn from_parts(map: BTreeMap<String, UserRecord>, snapshot: Option<PathBuf>) -> Self {
        let inner = Inner {
            records: RwLock::new(map),
            snapshot,
            dirty: AtomicBool::new(false),
            persist_lock: Mutex::new(()),
        };
        Self { inner: Arc::new(inner) }
    }

    /// Open a persistent collection backed by `path` with the default persist interval.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_interval(path, DEFAULT_PERSIST_INTERVAL)
    }

    /// Open a persistent collection backed by `path`, loading it if present,
    /// and start the background snapshot thread.
    pub fn open_with_interval(path: impl AsRef<Path>, interval: Duration) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let mut map = BTreeMap::new();
        if path.exists() {
            let bytes = std::fs::read(&path)?;
            let snap: Snapshot = serde_json::from_slice(&bytes)?;
            if snap.version != SNAPSHOT_VERSION {
                return Err(StoreError::Snapshot(format!(
                    "unsupported version {} in {}", snap.version, path.display()
                )));
            }
            if snap.collection != COLLECTION_NAME {
                warn!(target: "goalmusic::storage", "snapshot '{}' names collection '{}', loading as '{}'", path.display(), snap.collection, COLLECTION_NAME);
            }
            for r in snap.records {
                map.insert(r.id.clone(), r);
            }
            info!(target: "goalmusic::storage", "loaded {} user records from '{}'", map.len(), path.display());
        } else {
            info!(target: "goalmusic::storage", "no snapshot at '{}', starting empty", path.display());
        }
        let coll = Self::from_parts(map, Some(path));
        coll.start_persistence_loop(interval);
        Ok(coll)
    }

    /// Background snapshot thread. Holds only a weak handle and exits once the
    /// collection is dropped.
    fn start_persistence_loop(&self, interval: Duration) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        std::thread::spawn(move || loop {
            std::thread::sleep(interval);
            let Some(inner) = weak.upgrade() else { break; };
            let Some(path) = inner.snapshot.as_deref() else { break; };
            if !inner.dirty.load(Ordering::Acquire) { continue; }
            match inner.persist(path) {
                Ok(n) => debug!(target: "goalmusic::storage", "snapshot wrote {} user records to '{}'", n, path.display()),
                Err(e) => warn!(target: "goalmusic::storage", "snapshot to '{}' failed, will retry: {}", path.display(), e),
            }
        });
    }

    pub fn snapshot_path(&self) -> Option<&Path> { self.inner.snapshot.as_deref() }

    pub fn len(&self) -> usize { self.inner.records.read().len() }

    pub fn is_empty(&self) -> bool { self.inner.records.read().is_empty() }

    /// True when mutations have happened since the last snapshot.
    pub fn is_dirty(&self) -> bool { self.inner.dirty.load(Ordering::Acquire) }

    /// Run `f` under the write lock; mark dirty when it reports a change.
    fn mutate<R>(&self, f: impl FnOnce(&mut BTreeMap<String, UserRecord>) -> (R, bool)) -> R {
        let mut guard = self.inner.records.write();
        let (out, changed) = f(&mut *guard);
        if changed {
            self.inner.mark_dirty();
        }
        out
    }
}

#[async_trait]
impl UserCollection for MemoryCollection {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.inner.records.read().get(id).cloned())
    }

    async fn find_by_ids(&self, ids: &IdSet) -> StoreResult<Vec<UserRecord>> {
        let map = self.inner.records.read();
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    async fn upsert(&self, record: UserRecord) -> StoreResult<UpsertOutcome> {
        let id = record.id.clone();
        let outcome = self.mutate(|map| {
            let outcome = match map.insert(id.clone(), record) {
                Some(_) => UpsertOutcome::Matched,
                None => UpsertOutcome::Inserted,
            };
            (outcome, true)
        });
        debug!(target: "goalmusic::storage", "upsert id='{}' outcome={:?}", id, outcome);
        Ok(outcome)
    }

    async fn update_fields(&self, id: &str, mask: &FieldMask) -> StoreResult<u64> {
        let modified = self.mutate(|map| match map.get_mut(id) {
            Some(rec) => {
                mask.apply(rec);
                (1, true)
            }
            None => (0, false),
        });
        debug!(target: "goalmusic::storage", "update_fields id='{}' fields={:?} modified={}", id, mask.field_names(), modified);
        Ok(modified)
    }

    async fn delete_one(&self, id: &str) -> StoreResult<u64> {
        let deleted = self.mutate(|map| match map.remove(id) {
            Some(_) => (1, true),
            None => (0, false),
        });
        debug!(target: "goalmusic::storage", "delete_one id='{}' deleted={}", id, deleted);
        Ok(deleted)
    }

    async fn delete_many(&self, ids: &IdSet) -> StoreResult<u64> {
        let deleted = self.mutate(|map| {
            let n = ids.iter().filter(|id| map.remove(*id).is_some()).count() as u64;
            (n, n > 0)
        });
        debug!(target: "goalmusic::storage", "delete_many requested={} deleted={}", ids.len(), deleted);
        Ok(deleted)
    }

    async fn flush(&self) -> StoreResult<()> {
        if self.inner.snapshot.is_none() { return Ok(()); }
        let inner = Arc::clone(&self.inner);
        let written = tokio::task::spawn_blocking(move || {
            let path = inner.snapshot.as_deref().map(Path::to_path_buf);
            match path {
                Some(p) => inner.persist(&p).map(|n| (n, p)),
                None => Err(StoreError::Snapshot("collection has no snapshot path".into())),
            }
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;
        info!(target: "goalmusic::storage", "flushed {} user records to '{}'", written.0, written.1.display());
        Ok(())
    }
}
