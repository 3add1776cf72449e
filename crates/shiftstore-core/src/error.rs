//! Error types for shiftstore.

use std::fmt;

/// The main error type for shiftstore operations.
#[derive(Debug)]
pub enum Error {
    /// A lock was poisoned (internal error)
    LockPoisoned,

    /// I/O error from a file-backed host store
    Io(std::io::Error),

    /// Serialization/deserialization error
    Serialization(String),

    /// The host store refused a write for lack of capacity
    QuotaExceeded {
        /// Key whose write was refused
        key: String,
    },

    /// Any other host store failure
    Store(String),

    /// A key that does not follow the period key scheme
    InvalidKey(String),

    /// A value whose kind does not match the key it is saved under
    KindMismatch {
        /// Key the value was saved under
        key: String,
        /// Kind of the offending value
        found: &'static str,
    },

    /// Stored data was written by a newer, unreadable format version
    IncompatibleFormat {
        /// Version found in the store
        found: u32,
        /// Newest version this build can read
        supported: u32,
    },

    /// Invalid operation
    InvalidOperation(String),
}

impl Error {
    /// Returns `true` if this is a quota-exceeded failure.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Error::QuotaExceeded { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LockPoisoned => write!(f, "Lock poisoned"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::QuotaExceeded { key } => write!(f, "Storage quota exceeded writing '{}'", key),
            Error::Store(msg) => write!(f, "Store error: {}", msg),
            Error::InvalidKey(key) => write!(f, "Invalid storage key: '{}'", key),
            Error::KindMismatch { key, found } => {
                write!(f, "Cannot store a {} value under '{}'", found, key)
            }
            Error::IncompatibleFormat { found, supported } => write!(
                f,
                "Store format version {} is newer than supported version {}",
                found, supported
            ),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for shiftstore operations.
pub type Result<T> = std::result::Result<T, Error>;
