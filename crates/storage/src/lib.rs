//! Key-value state store abstraction.
//!
//! Components that need to survive restarts (balances, cheques) persist small
//! records through a [`StateStore`]. Keys are UTF-8 strings, values are opaque
//! bytes; [`StateStoreExt`] layers typed access on top using `postcard`.
//!
//! Every mutation is durable once the call returns. [`StateStore::put_batch`]
//! applies all of its entries or none of them.

mod memory;

use auto_impl::auto_impl;
use serde::{Serialize, de::DeserializeOwned};

pub use memory::MemoryStateStore;

/// Store error type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store has been closed.
    #[error("state store is closed")]
    Closed,
    /// Failed to encode a value for storage.
    #[error("failed to encode value for key {key}: {reason}")]
    Encode { key: String, reason: String },
    /// Failed to decode a stored value.
    #[error("failed to decode value for key {key}: {reason}")]
    Decode { key: String, reason: String },
    /// Backend failure.
    #[error("{0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable key-value store.
#[auto_impl(&, Box, Arc)]
pub trait StateStore: Send + Sync {
    /// Read the raw value stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Store all entries atomically.
    fn put_batch(&self, entries: &[(String, Vec<u8>)]) -> StoreResult<()>;

    /// Remove the value stored under `key`. Missing keys are not an error.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// All entries whose key starts with `prefix`, in key order.
    fn iter_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    /// Release the underlying resources. Further calls fail with [`StoreError::Closed`].
    fn close(&self) -> StoreResult<()>;
}

/// Typed access to a [`StateStore`].
pub trait StateStoreExt: StateStore {
    /// Read and decode the value stored under `key`.
    fn get_value<V: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<V>> {
        self.get(key)?
            .map(|bytes| decode_value(key, &bytes))
            .transpose()
    }

    /// Encode and store `value` under `key`.
    fn put_value<V: Serialize>(&self, key: &str, value: &V) -> StoreResult<()> {
        let bytes = encode_value(key, value)?;
        self.put(key, &bytes)
    }
}

impl<S: StateStore + ?Sized> StateStoreExt for S {}

/// Encode a value the way [`StateStoreExt::put_value`] does.
///
/// Useful for assembling [`StateStore::put_batch`] entries.
pub fn encode_value<V: Serialize>(key: &str, value: &V) -> StoreResult<Vec<u8>> {
    postcard::to_allocvec(value).map_err(|e| StoreError::Encode {
        key: key.to_owned(),
        reason: e.to_string(),
    })
}

/// Decode a value the way [`StateStoreExt::get_value`] does.
pub fn decode_value<V: DeserializeOwned>(key: &str, bytes: &[u8]) -> StoreResult<V> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::Decode {
        key: key.to_owned(),
        reason: e.to_string(),
    })
}
