//! Typed, per-entity views over a [`Store`] (spec.md §4.1): `get`,
//! `try_get`, `add`, `get_and_change`, `get_or_add`, `delete`, and `find`,
//! each encoding/decoding with the canonical SCALE codec so callers never
//! touch raw bytes.

use crate::column::Column;
use crate::store::Store;
use ledger_types::error::StateError;
use parity_scale_codec::{Decode, Encode};
use std::marker::PhantomData;

/// A typed view of one [`Column`] over a `Store`.
pub struct TypedCache<'a, T> {
    store: &'a dyn Store,
    column: Column,
    _marker: PhantomData<T>,
}

impl<'a, T: Encode + Decode> TypedCache<'a, T> {
    /// Builds a view of `column` over `store`.
    pub fn new(store: &'a dyn Store, column: Column) -> Self {
        Self {
            store,
            column,
            _marker: PhantomData,
        }
    }

    /// Reads the entry at `key`, returning [`StateError::KeyNotFound`] if
    /// it is absent.
    pub fn get(&self, key: &[u8]) -> Result<T, StateError> {
        self.try_get(key)?.ok_or(StateError::KeyNotFound)
    }

    /// Reads the entry at `key`, if present.
    pub fn try_get(&self, key: &[u8]) -> Result<Option<T>, StateError> {
        let raw = self
            .store
            .get_raw(self.column, key)
            .map_err(|e| StateError::Backend(e.to_string()))?;
        raw.map(|bytes| ledger_types::codec::decode(&bytes)).transpose()
    }

    /// Inserts `value` at `key`, failing with
    /// [`StateError::AlreadyExists`] if the key is already populated.
    pub fn add(&self, key: &[u8], value: &T) -> Result<(), StateError> {
        if self.try_get(key)?.is_some() {
            return Err(StateError::AlreadyExists);
        }
        self.put(key, value)
    }

    /// Writes `value` at `key`, overwriting any existing entry.
    pub fn put(&self, key: &[u8], value: &T) -> Result<(), StateError> {
        let encoded = ledger_types::codec::encode(value);
        self.store
            .put_raw(self.column, key, &encoded)
            .map_err(|e| StateError::Backend(e.to_string()))
    }

    /// Reads the entry at `key`, applies `mutate` to a clone of it, writes
    /// the result back, and returns the mutated value. Fails with
    /// [`StateError::KeyNotFound`] if the key is absent — use
    /// [`Self::get_or_add`] when a missing entry should be seeded instead.
    pub fn get_and_change(
        &self,
        key: &[u8],
        mutate: impl FnOnce(&mut T),
    ) -> Result<T, StateError> {
        let mut value = self.get(key)?;
        mutate(&mut value);
        self.put(key, &value)?;
        Ok(value)
    }

    /// Reads the entry at `key`, or seeds it with `default()` and writes
    /// that back, if absent. Either way, returns the resulting value.
    pub fn get_or_add(&self, key: &[u8], default: impl FnOnce() -> T) -> Result<T, StateError> {
        if let Some(value) = self.try_get(key)? {
            return Ok(value);
        }
        let value = default();
        self.put(key, &value)?;
        Ok(value)
    }

    /// Removes the entry at `key`, if present.
    pub fn delete(&self, key: &[u8]) -> Result<(), StateError> {
        self.store
            .delete_raw(self.column, key)
            .map_err(|e| StateError::Backend(e.to_string()))
    }

    /// Returns every entry whose key starts with `prefix`, decoded, in
    /// ascending key order.
    pub fn find(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>, StateError> {
        let raw = self
            .store
            .scan_prefix(self.column, prefix)
            .map_err(|e| StateError::Backend(e.to_string()))?;
        raw.into_iter()
            .map(|(k, v)| ledger_types::codec::decode(&v).map(|decoded| (k, decoded)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redb_store::RedbStore;
    use ledger_types::Fixed8;

    fn cache() -> (RedbStore, Column) {
        (RedbStore::open_in_memory().expect("open in-memory store"), Column::Accounts)
    }

    #[test]
    fn add_rejects_duplicate_keys() {
        let (store, column) = cache();
        let typed: TypedCache<Fixed8> = TypedCache::new(&store, column);
        typed.add(b"k", &Fixed8::from_whole(1)).expect("first add");
        assert!(typed.add(b"k", &Fixed8::from_whole(2)).is_err());
    }

    #[test]
    fn get_and_change_mutates_in_place() {
        let (store, column) = cache();
        let typed: TypedCache<Fixed8> = TypedCache::new(&store, column);
        typed.add(b"k", &Fixed8::from_whole(1)).expect("add");
        let updated = typed
            .get_and_change(b"k", |v| *v = *v + Fixed8::from_whole(1))
            .expect("change");
        assert_eq!(updated, Fixed8::from_whole(2));
    }

    #[test]
    fn get_or_add_seeds_missing_entries() {
        let (store, column) = cache();
        let typed: TypedCache<Fixed8> = TypedCache::new(&store, column);
        let value = typed.get_or_add(b"k", || Fixed8::from_whole(9)).expect("seed");
        assert_eq!(value, Fixed8::from_whole(9));
        let again = typed.get_or_add(b"k", || Fixed8::from_whole(1)).expect("read back");
        assert_eq!(again, Fixed8::from_whole(9));
    }

    #[test]
    fn delete_then_get_reports_not_found() {
        let (store, column) = cache();
        let typed: TypedCache<Fixed8> = TypedCache::new(&store, column);
        typed.add(b"k", &Fixed8::from_whole(1)).expect("add");
        typed.delete(b"k").expect("delete");
        assert!(matches!(typed.get(b"k"), Err(StateError::KeyNotFound)));
    }
}
