//! Period key schema
//!
//! Every component (cache, write queue, host store) identifies data by a
//! [`StorageKey`]. Period data lives under `{kind}-{periodIndex}`; a handful
//! of fixed metadata keys sit beside it.

use crate::{Error, Result};
use std::fmt;

/// Pointer to the period the application last worked on
pub const CURRENT_PERIOD_KEY: &str = "current-period-index";

/// Format version stamp of the period-keyed layout
pub const CACHE_VERSION_KEY: &str = "cache-version";

/// Legacy monolithic schedule blob (all periods in one record)
pub const LEGACY_SCHEDULE_KEY: &str = "schedules-by-period";

/// Legacy monolithic staff blob (all periods in one record)
pub const LEGACY_STAFF_KEY: &str = "staff-by-period";

/// Key names used by earlier releases, removed once migration is verified
pub const HISTORICAL_KEYS: &[&str] = &[
    "schedule-data",
    "staff-data",
    "schedule-backup",
    "staff-backup",
    "period-config",
    "last-sync-time",
];

/// Substrings left in keys built from a missing or invalid period index
const MALFORMED_MARKERS: &[&str] = &["undefined", "null", "NaN", "[object"];

/// The category of data stored under a period key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Shift assignments per staff member and date
    Schedule,
    /// Ordered staff records
    Staff,
}

impl EntityKind {
    /// All period-keyed kinds
    pub const ALL: [EntityKind; 2] = [EntityKind::Schedule, EntityKind::Staff];

    /// Key prefix for this kind, without the trailing separator
    pub fn prefix(self) -> &'static str {
        match self {
            EntityKind::Schedule => "schedule",
            EntityKind::Staff => "staff",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "schedule" => Some(EntityKind::Schedule),
            "staff" => Some(EntityKind::Staff),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// An opaque key shared by the cache, the write queue and the host store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    /// Key for the data of `kind` in period `index`
    pub fn period(kind: EntityKind, index: u32) -> Self {
        StorageKey(format!("{}-{}", kind.prefix(), index))
    }

    /// Shorthand for `StorageKey::period(EntityKind::Schedule, index)`
    pub fn schedule(index: u32) -> Self {
        Self::period(EntityKind::Schedule, index)
    }

    /// Shorthand for `StorageKey::period(EntityKind::Staff, index)`
    pub fn staff(index: u32) -> Self {
        Self::period(EntityKind::Staff, index)
    }

    /// The current-period pointer
    pub fn current_period() -> Self {
        StorageKey(CURRENT_PERIOD_KEY.to_string())
    }

    /// The format version stamp
    pub fn cache_version() -> Self {
        StorageKey(CACHE_VERSION_KEY.to_string())
    }

    /// The legacy blob holding data of `kind` for every period
    pub fn legacy(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Schedule => StorageKey(LEGACY_SCHEDULE_KEY.to_string()),
            EntityKind::Staff => StorageKey(LEGACY_STAFF_KEY.to_string()),
        }
    }

    /// Wraps a raw key read back from the host store.
    ///
    /// Raw keys are accepted as-is; use [`StorageKey::parse_period`] when the
    /// key must be a well-formed period key.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        StorageKey(raw.into())
    }

    /// Parses a period key, failing on anything else
    pub fn parse_period(raw: &str) -> Result<(EntityKind, u32)> {
        Self::from_raw(raw)
            .split_period()
            .ok_or_else(|| Error::InvalidKey(raw.to_string()))
    }

    /// The raw key string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The entity kind, for period keys
    pub fn kind(&self) -> Option<EntityKind> {
        self.split_period().map(|(kind, _)| kind)
    }

    /// The period index, for period keys
    pub fn period_index(&self) -> Option<u32> {
        self.split_period().map(|(_, index)| index)
    }

    fn split_period(&self) -> Option<(EntityKind, u32)> {
        let (prefix, index) = self.0.split_once('-')?;
        let kind = EntityKind::from_prefix(prefix)?;
        // Reject "+1", "01" and friends so that one period maps to one key.
        if index.is_empty()
            || !index.bytes().all(|b| b.is_ascii_digit())
            || (index.len() > 1 && index.starts_with('0'))
        {
            return None;
        }
        index.parse().ok().map(|index| (kind, index))
    }

    /// Returns `true` for keys produced by serializing a missing period index.
    ///
    /// Only keys with a known kind prefix qualify, so unrelated keys that
    /// happen to contain "null" are never matched.
    pub fn is_malformed(&self) -> bool {
        let Some((prefix, rest)) = self.0.split_once('-') else {
            return false;
        };
        EntityKind::from_prefix(prefix).is_some()
            && MALFORMED_MARKERS.iter().any(|marker| rest.contains(marker))
    }

    /// Returns `true` for the legacy blobs and historical key names
    pub fn is_legacy(&self) -> bool {
        self.0 == LEGACY_SCHEDULE_KEY
            || self.0 == LEGACY_STAFF_KEY
            || HISTORICAL_KEYS.contains(&self.0.as_str())
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Collects the sorted, de-duplicated period indices of `kind` among `keys`
pub fn periods_of<'a, I>(kind: EntityKind, keys: I) -> Vec<u32>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut periods: Vec<u32> = keys
        .into_iter()
        .filter_map(|raw| StorageKey::parse_period(raw).ok())
        .filter(|(k, _)| *k == kind)
        .map(|(_, index)| index)
        .collect();
    periods.sort_unstable();
    periods.dedup();
    periods
}
