//! A `redb`-backed [`Store`] implementation.
//!
//! Follows the teacher's choice of `redb` as the pure-Rust embedded
//! backend. Every column shares one `redb` table; keys are tagged with
//! their column byte (spec.md's "C1" wants one physical store with
//! logically distinct typed caches, not one table per entity kind).

use crate::column::Column;
use crate::store::{StorageError, Store};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("ledger");

/// A `redb`-backed store.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Opens (creating if absent) a `redb` database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path).map_err(|e| StorageError::Backend(e.to_string()))?;
        let write_txn = db.begin_write().map_err(|e| StorageError::Backend(e.to_string()))?;
        {
            write_txn
                .open_table(TABLE)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        write_txn.commit().map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self { db })
    }

    /// Opens an in-memory `redb` database, for tests and ephemeral nodes.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let backend =
            redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let write_txn = db.begin_write().map_err(|e| StorageError::Backend(e.to_string()))?;
        {
            write_txn
                .open_table(TABLE)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        write_txn.commit().map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self { db })
    }
}

impl Store for RedbStore {
    fn get_raw(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let physical = column.physical_key(key);
        let read_txn = self.db.begin_read().map_err(|e| StorageError::Backend(e.to_string()))?;
        let table = read_txn
            .open_table(TABLE)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let value = table
            .get(physical.as_slice())
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn put_raw(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let physical = column.physical_key(key);
        let write_txn = self.db.begin_write().map_err(|e| StorageError::Backend(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            table
                .insert(physical.as_slice(), value)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        write_txn.commit().map_err(|e| StorageError::CommitFailed(e.to_string()))
    }

    fn delete_raw(&self, column: Column, key: &[u8]) -> Result<(), StorageError> {
        let physical = column.physical_key(key);
        let write_txn = self.db.begin_write().map_err(|e| StorageError::Backend(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            table
                .remove(physical.as_slice())
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        write_txn.commit().map_err(|e| StorageError::CommitFailed(e.to_string()))
    }

    fn scan_prefix(
        &self,
        column: Column,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let physical_prefix = column.physical_key(prefix);
        let read_txn = self.db.begin_read().map_err(|e| StorageError::Backend(e.to_string()))?;
        let table = read_txn
            .open_table(TABLE)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let mut out = Vec::new();
        for entry in table.range(physical_prefix.as_slice()..).map_err(|e| StorageError::Backend(e.to_string()))? {
            let (k, v) = entry.map_err(|e| StorageError::Backend(e.to_string()))?;
            let key_bytes = k.value();
            if !key_bytes.starts_with(physical_prefix.as_slice()) {
                break;
            }
            out.push((key_bytes[1..].to_vec(), v.value().to_vec()));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store = RedbStore::open_in_memory().expect("open in-memory store");
        store.put_raw(Column::Accounts, b"k1", b"v1").expect("put");
        assert_eq!(store.get_raw(Column::Accounts, b"k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(store.get_raw(Column::Assets, b"k1").unwrap(), None);
    }

    #[test]
    fn delete_removes_the_key() {
        let store = RedbStore::open_in_memory().expect("open in-memory store");
        store.put_raw(Column::Accounts, b"k1", b"v1").expect("put");
        store.delete_raw(Column::Accounts, b"k1").expect("delete");
        assert_eq!(store.get_raw(Column::Accounts, b"k1").unwrap(), None);
    }

    #[test]
    fn scan_prefix_is_column_scoped() {
        let store = RedbStore::open_in_memory().expect("open in-memory store");
        store.put_raw(Column::Accounts, b"aa", b"1").expect("put");
        store.put_raw(Column::Accounts, b"ab", b"2").expect("put");
        store.put_raw(Column::Assets, b"aa", b"3").expect("put");
        let found = store.scan_prefix(Column::Accounts, b"a").expect("scan");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn on_disk_store_survives_a_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ledger.redb");

        {
            let store = RedbStore::open(&path).expect("create on-disk store");
            store.put_raw(Column::Accounts, b"k1", b"v1").expect("put");
        }

        let reopened = RedbStore::open(&path).expect("reopen on-disk store");
        assert_eq!(reopened.get_raw(Column::Accounts, b"k1").unwrap(), Some(b"v1".to_vec()));
    }
}
