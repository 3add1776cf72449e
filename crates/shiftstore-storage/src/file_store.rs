//! Directory-backed host store
//!
//! One file per key. File names are the hex encoding of the key bytes so
//! that any key, malformed ones included, maps to a valid file name.

use crate::kv::{KeyValueStore, StoreError};
use shiftstore_core::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

const VALUE_EXT: &str = "kv";
const TEMP_EXT: &str = "tmp";

/// A [`KeyValueStore`] keeping each key in its own file
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    quota_bytes: Option<u64>,
    /// Serializes writers so quota accounting and rename stay consistent
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open or create a store in `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            quota_bytes: None,
            write_lock: Mutex::new(()),
        })
    }

    /// Open or create a store in `dir` that refuses writes beyond `quota_bytes`
    pub fn open_with_quota(dir: impl AsRef<Path>, quota_bytes: u64) -> Result<Self> {
        let mut store = Self::open(dir)?;
        store.quota_bytes = Some(quota_bytes);
        Ok(store)
    }

    /// The directory holding the store
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_name(key), VALUE_EXT))
    }

    /// Bytes used by every key except `skip`
    fn used_bytes(&self, skip: &str) -> u64 {
        self.keys()
            .iter()
            .filter(|k| k.as_str() != skip)
            .map(|k| {
                let len = fs::metadata(self.path_for(k)).map(|m| m.len()).unwrap_or(0);
                k.len() as u64 + len
            })
            .sum()
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &[u8]) -> std::result::Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        if let Some(quota) = self.quota_bytes {
            if self.used_bytes(key) + key.len() as u64 + value.len() as u64 > quota {
                return Err(StoreError::QuotaExceeded);
            }
        }

        let path = self.path_for(key);
        let temp = path.with_extension(TEMP_EXT);
        fs::write(&temp, value).map_err(|e| io_error(key, e))?;
        fs::rename(&temp, &path).map_err(|e| io_error(key, e))
    }

    fn remove(&self, key: &str) -> std::result::Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(key, e)),
        }
    }

    fn keys(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let stem = name.to_str()?.strip_suffix(&format!(".{}", VALUE_EXT))?;
                decode_name(stem)
            })
            .collect()
    }
}

fn io_error(key: &str, err: std::io::Error) -> StoreError {
    warn!(key, error = %err, "file store I/O failure");
    StoreError::Backend(err.to_string())
}

fn encode_name(key: &str) -> String {
    key.bytes().map(|b| format!("{:02x}", b)).collect()
}

fn decode_name(name: &str) -> Option<String> {
    if name.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..name.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(name.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}
