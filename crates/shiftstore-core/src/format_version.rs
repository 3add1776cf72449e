//! Format versions of the period-keyed layout
//!
//! The version is stamped under the `cache-version` key so that a store
//! written by a newer release is never silently misread.

/// Layout written by this release
pub const STORE_FORMAT_VERSION: u32 = 2;

/// Version of the monolithic single-blob layout
pub const LEGACY_FORMAT_VERSION: u32 = 1;

/// Version compatibility information
pub struct FormatVersion {
    /// Current version of this format
    pub current: u32,
    /// Minimum supported version for reading
    pub min_read: u32,
}

impl FormatVersion {
    /// Check if a version can be read
    pub fn can_read(&self, version: u32) -> bool {
        version >= self.min_read && version <= self.current
    }

    /// Check if a stamped version should be rewritten to the current one
    pub fn needs_stamp(&self, version: Option<u32>) -> bool {
        version.map_or(true, |v| v < self.current)
    }
}

/// Period-keyed layout version info
pub fn store_version() -> FormatVersion {
    FormatVersion {
        current: STORE_FORMAT_VERSION,
        min_read: LEGACY_FORMAT_VERSION,
    }
}
