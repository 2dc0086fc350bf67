//! The copy-on-write snapshot cache (spec.md §4.1).
//!
//! A `Snapshot` buffers writes in memory against a parent `Store` and only
//! applies them on `commit()`. Because a `Snapshot` is itself a `Store`, it
//! nests: the persist engine builds one snapshot per block over the root
//! store, and the VM sandbox seam builds a child snapshot over that one per
//! contract invocation, so a failed invocation can be discarded by simply
//! dropping its snapshot without touching the block-level one.

use crate::column::Column;
use crate::store::{StorageError, Store};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
enum Change {
    Put(Vec<u8>),
    Delete,
}

/// A copy-on-write overlay over a parent [`Store`].
pub struct Snapshot {
    parent: Arc<dyn Store>,
    overlay: RwLock<HashMap<(Column, Vec<u8>), Change>>,
}

impl Snapshot {
    /// Builds a new, empty snapshot over `parent`.
    pub fn new(parent: Arc<dyn Store>) -> Self {
        Self {
            parent,
            overlay: RwLock::new(HashMap::new()),
        }
    }

    /// Builds a child snapshot over this snapshot, for the VM sandbox seam:
    /// writes made in the child are invisible to `self` until the child's
    /// own `commit()` is called, and can be discarded by dropping the
    /// child outright.
    pub fn child(self: &Arc<Self>) -> Snapshot {
        Snapshot::new(self.clone() as Arc<dyn Store>)
    }

    /// Applies every buffered write to the parent store and clears the
    /// overlay. Per spec.md §7, a failure here is fatal: the caller must
    /// not continue with a snapshot whose writes are only partially
    /// durable.
    pub fn commit(&self) -> Result<(), StorageError> {
        let mut overlay = self.overlay.write();
        let dirty = overlay.len();
        for ((column, key), change) in overlay.drain() {
            match change {
                Change::Put(value) => self.parent.put_raw(column, &key, &value)?,
                Change::Delete => self.parent.delete_raw(column, &key)?,
            }
        }
        tracing::debug!(dirty_entries = dirty, "snapshot: committed");
        Ok(())
    }

    /// True if this snapshot has no buffered, uncommitted writes.
    pub fn is_clean(&self) -> bool {
        self.overlay.read().is_empty()
    }
}

impl Store for Snapshot {
    fn get_raw(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        if let Some(change) = self.overlay.read().get(&(column, key.to_vec())) {
            return Ok(match change {
                Change::Put(value) => Some(value.clone()),
                Change::Delete => None,
            });
        }
        self.parent.get_raw(column, key)
    }

    fn put_raw(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.overlay
            .write()
            .insert((column, key.to_vec()), Change::Put(value.to_vec()));
        Ok(())
    }

    fn delete_raw(&self, column: Column, key: &[u8]) -> Result<(), StorageError> {
        self.overlay
            .write()
            .insert((column, key.to_vec()), Change::Delete);
        Ok(())
    }

    fn scan_prefix(
        &self,
        column: Column,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let mut merged: std::collections::BTreeMap<Vec<u8>, Option<Vec<u8>>> =
            std::collections::BTreeMap::new();
        for (key, value) in self.parent.scan_prefix(column, prefix)? {
            merged.insert(key, Some(value));
        }
        for ((col, key), change) in self.overlay.read().iter() {
            if *col == column && key.starts_with(prefix) {
                merged.insert(
                    key.clone(),
                    match change {
                        Change::Put(value) => Some(value.clone()),
                        Change::Delete => None,
                    },
                );
            }
        }
        Ok(merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redb_store::RedbStore;

    fn snapshot() -> Snapshot {
        let store: Arc<dyn Store> =
            Arc::new(RedbStore::open_in_memory().expect("open in-memory store"));
        Snapshot::new(store)
    }

    #[test]
    fn writes_are_invisible_to_parent_until_commit() {
        let snap = snapshot();
        snap.put_raw(Column::Accounts, b"k", b"v").expect("put");
        assert_eq!(snap.get_raw(Column::Accounts, b"k").unwrap(), Some(b"v".to_vec()));
        snap.commit().expect("commit");
        assert!(snap.is_clean());
    }

    #[test]
    fn child_snapshot_writes_do_not_leak_into_parent() {
        let parent = Arc::new(snapshot());
        parent.put_raw(Column::Accounts, b"k", b"parent").expect("put");
        parent.commit().expect("commit");

        let child = parent.child();
        child.put_raw(Column::Accounts, b"k", b"child").expect("put");
        assert_eq!(
            parent.get_raw(Column::Accounts, b"k").unwrap(),
            Some(b"parent".to_vec())
        );
        assert_eq!(
            child.get_raw(Column::Accounts, b"k").unwrap(),
            Some(b"child".to_vec())
        );
    }

    #[test]
    fn delete_then_scan_omits_the_key() {
        let snap = snapshot();
        snap.put_raw(Column::Accounts, b"a1", b"1").expect("put");
        snap.commit().expect("commit");
        snap.delete_raw(Column::Accounts, b"a1").expect("delete");
        let found = snap.scan_prefix(Column::Accounts, b"a").expect("scan");
        assert!(found.is_empty());
    }
}
