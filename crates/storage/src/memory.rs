//! In-memory state store.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::{StateStore, StoreError, StoreResult};

/// Volatile [`StateStore`] for tests and ephemeral nodes.
#[derive(Debug)]
pub struct MemoryStateStore {
    /// `None` once closed.
    entries: RwLock<Option<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Some(BTreeMap::new())),
        }
    }

    /// Number of stored entries (zero once closed).
    pub fn len(&self) -> usize {
        self.entries.read().as_ref().map_or(0, BTreeMap::len)
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let entries = self.entries.read();
        let entries = entries.as_ref().ok_or(StoreError::Closed)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut entries = self.entries.write();
        let entries = entries.as_mut().ok_or(StoreError::Closed)?;
        entries.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn put_batch(&self, batch: &[(String, Vec<u8>)]) -> StoreResult<()> {
        let mut entries = self.entries.write();
        let entries = entries.as_mut().ok_or(StoreError::Closed)?;
        for (key, value) in batch {
            entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.write();
        let entries = entries.as_mut().ok_or(StoreError::Closed)?;
        entries.remove(key);
        Ok(())
    }

    fn iter_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let entries = self.entries.read();
        let entries = entries.as_ref().ok_or(StoreError::Closed)?;
        Ok(entries
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn close(&self) -> StoreResult<()> {
        self.entries.write().take();
        Ok(())
    }
}
