//! An in-memory [`KvStore`], used by tests and by a daemon started without
//! a data directory. Tables are created on first use.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::{KvStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<&'static str, BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, table: &'static str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables.get(table).and_then(|t| t.get(key).cloned()))
    }

    fn put(&self, table: &'static str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        tables
            .entry(table)
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, table: &'static str, key: &[u8]) -> Result<(), StoreError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        if let Some(t) = tables.get_mut(table) {
            t.remove(key);
        }
        Ok(())
    }

    fn iter(&self, table: &'static str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables
            .get(table)
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_table_reads_as_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing", b"x").unwrap(), None);
        assert_eq!(store.iter("missing").unwrap(), Vec::new());
    }

    #[test]
    fn iter_reflects_puts_and_deletes() {
        let store = MemoryStore::new();
        store.put("t", b"a", b"1").unwrap();
        store.put("t", b"b", b"2").unwrap();
        assert_eq!(store.len("t").unwrap(), 2);
        store.delete("t", b"a").unwrap();
        assert_eq!(store.iter("t").unwrap(), vec![(b"b".to_vec(), b"2".to_vec())]);
    }
}
