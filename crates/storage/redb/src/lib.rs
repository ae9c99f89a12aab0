//! redb-based state store backend.
//!
//! This crate provides [`RedbStateStore`], a persistent [`StateStore`]
//! backed by the redb embedded database. Every mutation runs in its own
//! write transaction and is durable once committed.

use std::fmt::Display;
use std::path::Path;

use parking_lot::RwLock;
use redb::{Database, TableDefinition};
use tracing::debug;
use vertex_storage::{StateStore, StoreError, StoreResult};

/// Table definition for state records.
/// Key: UTF-8 record key
/// Value: encoded record bytes
const STATE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("state");

fn backend(err: impl Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// redb-based state store.
///
/// Thread-safe for concurrent reads and writes; redb serializes writers.
pub struct RedbStateStore {
    /// `None` once closed.
    db: RwLock<Option<Database>>,
}

impl RedbStateStore {
    /// Open or create a state store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = Database::create(path.as_ref()).map_err(backend)?;

        // Ensure the state table exists
        let write_txn = db.begin_write().map_err(backend)?;
        {
            let _ = write_txn.open_table(STATE_TABLE).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;

        debug!(path = %path.as_ref().display(), "Opened redb state store");
        Ok(Self {
            db: RwLock::new(Some(db)),
        })
    }

    fn write<F>(&self, apply: F) -> StoreResult<()>
    where
        F: FnOnce(&mut redb::Table<'_, &'static str, &'static [u8]>) -> Result<(), redb::StorageError>,
    {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;

        let write_txn = db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_table(STATE_TABLE).map_err(backend)?;
            apply(&mut table).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)
    }
}

impl StateStore for RedbStateStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;

        let read_txn = db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(STATE_TABLE).map_err(backend)?;
        match table.get(key).map_err(backend)? {
            Some(value) => Ok(Some(value.value().to_vec())),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.write(|table| table.insert(key, value).map(|_| ()))
    }

    fn put_batch(&self, entries: &[(String, Vec<u8>)]) -> StoreResult<()> {
        self.write(|table| {
            for (key, value) in entries {
                table.insert(key.as_str(), value.as_slice())?;
            }
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.write(|table| table.remove(key).map(|_| ()))
    }

    fn iter_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;

        let read_txn = db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(STATE_TABLE).map_err(backend)?;

        let mut entries = Vec::new();
        for entry in table.range(prefix..).map_err(backend)? {
            let (key, value) = entry.map_err(backend)?;
            if !key.value().starts_with(prefix) {
                break;
            }
            entries.push((key.value().to_owned(), value.value().to_vec()));
        }
        Ok(entries)
    }

    fn close(&self) -> StoreResult<()> {
        if self.db.write().take().is_some() {
            debug!("Closed redb state store");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use vertex_storage::StateStoreExt;

    #[test]
    fn test_put_get() {
        let dir = tempdir().unwrap();
        let store = RedbStateStore::open(dir.path().join("state.redb")).unwrap();

        store.put("balance_01", b"hello").unwrap();
        assert_eq!(store.get("balance_01").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(store.get("balance_02").unwrap(), None);
    }

    #[test]
    fn test_overwrite() {
        let dir = tempdir().unwrap();
        let store = RedbStateStore::open(dir.path().join("state.redb")).unwrap();

        store.put_value("k", &1i64).unwrap();
        store.put_value("k", &-2i64).unwrap();
        assert_eq!(store.get_value::<i64>("k").unwrap(), Some(-2));
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let store = RedbStateStore::open(dir.path().join("state.redb")).unwrap();

        store.put("k", b"v").unwrap();
        store.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_prefix_scan() {
        let dir = tempdir().unwrap();
        let store = RedbStateStore::open(dir.path().join("state.redb")).unwrap();

        store
            .put_batch(&[
                ("balance_aa".into(), vec![1]),
                ("balance_bb".into(), vec![2]),
                ("received_cheque_aa".into(), vec![3]),
                ("sent_cheque_aa".into(), vec![4]),
            ])
            .unwrap();

        let balances = store.iter_prefix("balance_").unwrap();
        let keys: Vec<_> = balances.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["balance_aa", "balance_bb"]);
    }

    #[test]
    fn test_balance_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.redb");

        let store = RedbStateStore::open(&path).unwrap();
        store.put_value("balance_peer", &-8888i64).unwrap();
        store.close().unwrap();
        drop(store);

        let reopened = RedbStateStore::open(&path).unwrap();
        assert_eq!(reopened.get_value::<i64>("balance_peer").unwrap(), Some(-8888));
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let dir = tempdir().unwrap();
        let store = RedbStateStore::open(dir.path().join("state.redb")).unwrap();
        store.close().unwrap();

        assert_eq!(store.get("k"), Err(StoreError::Closed));
        assert_eq!(store.put("k", b"v"), Err(StoreError::Closed));
    }
}
