//! Host key-value store contract and the error-mapping adapter around it.
//!
//! The host store is synchronous and may refuse writes once its capacity is
//! spent. Everything above [`StoreAdapter`] works with typed
//! [`StoredValue`]s and shiftstore [`Error`]s; nothing below it does.

use shiftstore_core::{Error, Result, StorageKey, StoredValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{error, warn};

/// Failure reported by a host store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store has no room left for the write
    QuotaExceeded,
    /// Any other backend failure
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::QuotaExceeded => write!(f, "quota exceeded"),
            StoreError::Backend(msg) => write!(f, "backend failure: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// A synchronous host key-value store
pub trait KeyValueStore: Send + Sync {
    /// Retrieve the bytes stored under `key`
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Insert or replace the bytes stored under `key`
    fn set(&self, key: &str, value: &[u8]) -> std::result::Result<(), StoreError>;

    /// Remove `key`; removing a missing key succeeds
    fn remove(&self, key: &str) -> std::result::Result<(), StoreError>;

    /// Enumerate all keys
    fn keys(&self) -> Vec<String>;
}

/// In-memory [`KeyValueStore`] with an optional byte quota.
///
/// The quota counts key and value bytes, the same way usage is estimated by
/// the quota monitor.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    /// Creates an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that refuses writes beyond `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.data.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &[u8]) -> std::result::Result<(), StoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        if let Some(quota) = self.quota_bytes {
            let used: usize = data
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StoreError::QuotaExceeded);
            }
        }

        data.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> std::result::Result<(), StoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        data.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.data
            .read()
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Error-mapping wrapper over a host store.
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct StoreAdapter {
    store: Arc<dyn KeyValueStore>,
}

impl StoreAdapter {
    /// Wraps a host store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Raw bytes stored under `key`
    pub fn get_raw(&self, key: &StorageKey) -> Option<Vec<u8>> {
        self.store.get(key.as_str())
    }

    /// Returns `true` if the store holds `key`
    pub fn contains(&self, key: &StorageKey) -> bool {
        self.get_raw(key).is_some()
    }

    /// Reads and decodes the durable value under `key`.
    ///
    /// Undecodable bytes are logged and reported as absent so that one
    /// corrupt entry degrades to empty state.
    pub fn read(&self, key: &StorageKey) -> Option<StoredValue> {
        let bytes = self.get_raw(key)?;
        match StoredValue::decode(key, &bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "discarding undecodable stored value");
                None
            }
        }
    }

    /// Writes raw bytes, mapping host failures to shiftstore errors
    pub fn set_raw(&self, key: &StorageKey, bytes: &[u8]) -> Result<()> {
        self.store
            .set(key.as_str(), bytes)
            .map_err(|e| map_store_error(key, e))
    }

    /// Encodes and writes `value`
    pub fn write(&self, key: &StorageKey, value: &StoredValue) -> Result<()> {
        self.set_raw(key, &value.encode()?)
    }

    /// Removes `key` from the store
    pub fn remove(&self, key: &StorageKey) -> Result<()> {
        self.store
            .remove(key.as_str())
            .map_err(|e| map_store_error(key, e))
    }

    /// All keys in the store
    pub fn keys(&self) -> Vec<String> {
        self.store.keys()
    }

    /// Estimated usage: byte length of every key and value
    pub fn usage_bytes(&self) -> usize {
        self.store
            .keys()
            .iter()
            .map(|k| k.len() + self.store.get(k).map_or(0, |v| v.len()))
            .sum()
    }
}

fn map_store_error(key: &StorageKey, err: StoreError) -> Error {
    match err {
        StoreError::QuotaExceeded => Error::QuotaExceeded {
            key: key.to_string(),
        },
        StoreError::Backend(msg) => {
            error!(key = %key, error = %msg, "host store failure");
            Error::Store(msg)
        }
    }
}
