//! In-memory store handle: an RCU-style snapshot (§5, §9 "Global state").
//!
//! Readers clone an `Arc<StoreMetadata>` and never block a concurrent build;
//! a build computes a whole new snapshot and swaps it in atomically on commit.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::error::{Error, StoreError};
use crate::store::storage;
use crate::store::types::StoreMetadata;

/// Thread-safe handle to the persisted store.
pub struct Store {
    path: PathBuf,
    snapshot: RwLock<Arc<StoreMetadata>>,
    /// Serializes builds: only one write transaction (§4.2) at a time.
    build_lock: Mutex<()>,
}

impl Store {
    /// Open an existing store file, or start from an empty snapshot if none
    /// exists yet (§8 "Empty corpus" boundary case).
    pub fn open_or_create(path: &Path) -> Result<Self, Error> {
        let metadata = storage::load_store(path)?.unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            snapshot: RwLock::new(Arc::new(metadata)),
            build_lock: Mutex::new(()),
        })
    }

    /// The current immutable snapshot. Cheap: an `Arc` clone.
    pub fn snapshot(&self) -> Arc<StoreMetadata> {
        self.snapshot.read().clone()
    }

    /// Begin a build: acquires the single write slot and hands back a draft
    /// copy of the current snapshot to mutate. Returns `Store::Locked` if a
    /// build is already in progress, never blocks readers.
    pub fn begin_build(&self) -> Result<BuildGuard<'_>, Error> {
        let guard = self
            .build_lock
            .try_lock()
            .ok_or(Error::Store(StoreError::Locked))?;
        let draft = (*self.snapshot.read()).as_ref().clone();
        Ok(BuildGuard {
            store: self,
            _guard: guard,
            draft,
        })
    }
}

/// A draft snapshot being mutated by one build. Dropping without calling
/// [`BuildGuard::commit`] discards the draft and leaves the store unchanged
/// (errors inside a build abort the whole build, §7).
pub struct BuildGuard<'a> {
    store: &'a Store,
    _guard: MutexGuard<'a, ()>,
    pub draft: StoreMetadata,
}

impl BuildGuard<'_> {
    /// Persist the draft to disk and publish it as the new snapshot.
    pub fn commit(mut self) -> Result<(), Error> {
        self.draft.last_updated = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        storage::write_store(&self.store.path, &self.draft)?;
        *self.store.snapshot.write() = Arc::new(std::mem::take(&mut self.draft));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_or_create_starts_empty_when_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.bin");
        let store = Store::open_or_create(&path).unwrap();
        let snap = store.snapshot();
        assert!(snap.passages.is_empty());
    }

    #[test]
    fn build_commit_is_visible_to_new_snapshots() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.bin");
        let store = Store::open_or_create(&path).unwrap();

        let before = store.snapshot();
        assert!(before.files.is_empty());

        let mut build = store.begin_build().unwrap();
        build.draft.files.push(crate::store::types::FileRow {
            path: "a.md".into(),
            mtime: 0,
            size: 0,
            hash: "h".into(),
        });
        build.commit().unwrap();

        let after = store.snapshot();
        assert_eq!(after.files.len(), 1);
        // The snapshot taken before commit is untouched (RCU semantics).
        assert!(before.files.is_empty());
    }

    #[test]
    fn concurrent_build_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.bin");
        let store = Store::open_or_create(&path).unwrap();

        let _first = store.begin_build().unwrap();
        let second = store.begin_build();
        assert!(matches!(second, Err(Error::Store(StoreError::Locked))));
    }

    #[test]
    fn reopen_reloads_persisted_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.bin");
        let store = Store::open_or_create(&path).unwrap();
        let mut build = store.begin_build().unwrap();
        build.draft.next_passage_id = 7;
        build.commit().unwrap();
        drop(store);

        let reopened = Store::open_or_create(&path).unwrap();
        assert_eq!(reopened.snapshot().next_passage_id, 7);
    }
}
