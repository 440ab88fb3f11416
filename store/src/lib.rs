//! Durable key-value store abstraction for the Drift wallet core.
//!
//! Every persistence backend (browser storage bridge, file store,
//! in-memory for testing) implements [`KvStore`]. The rest of the
//! workspace depends only on the trait. Records are JSON values keyed by
//! string, matching the wallet's persisted layout (`queue:transactions`,
//! `state:local`, `cache:<key>`, `recovery:…`, `session:…`).

pub mod error;
pub mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

use serde::{de::DeserializeOwned, Serialize};

/// A durable string-keyed JSON record store.
///
/// Implementations must be safe for concurrent callers.
pub trait KvStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;
    fn put_raw(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// All keys starting with `prefix` ("" lists everything).
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Typed convenience layer over [`KvStore`].
pub trait KvStoreExt: KvStore {
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get_raw(key)? {
            Some(value) => Ok(Some(
                serde_json::from_value(value).map_err(StoreError::Serialization)?,
            )),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, key: &str, record: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(record).map_err(StoreError::Serialization)?;
        self.put_raw(key, value)
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}
