//! # Shiftstore Migration
//!
//! One-time conversion from the legacy single-blob layout to period keys.
//!
//! ## ⚠️ Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of shiftstore.**
//!
//! Users should depend on the main `shiftstore` crate instead, which
//! provides the stable public API. This crate's API may change without
//! notice between minor versions.
//!
//! ---
//!
//! A store moves through these states:
//!
//! ```text
//! Uninitialized ─(legacy data?)─→ Migrating ─→ Verified ─→ LegacyCleaned
//!        │                                  └─→ VerificationFailed
//!        └─(none)─→ NotNeeded
//! ```
//!
//! Reads and writes of period keys work in every state; migration never
//! blocks normal traffic.
//!
//! ## Usage
//!
//! ```ignore
//! use shiftstore_migration::{MigrationManager, MigrationState};
//!
//! let mut migration = MigrationManager::new(&store);
//! match migration.run()? {
//!     MigrationState::VerificationFailed => eprintln!("legacy data kept for inspection"),
//!     state => println!("migration: {state:?}"),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use shiftstore_core::EntityKind;
use std::fmt;

pub mod legacy;
pub mod manager;

pub use manager::MigrationManager;

/// Migration progress of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// Nothing checked yet
    Uninitialized,
    /// No legacy data found
    NotNeeded,
    /// Legacy periods are being written to period keys
    Migrating,
    /// All legacy data decoded and every period has at least as many
    /// migrated records
    Verified,
    /// Some legacy data is missing or unreadable; legacy data is kept
    VerificationFailed,
    /// Legacy and historical keys were removed
    LegacyCleaned,
}

/// Outcome of [`MigrationManager::migrate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Period indices written, ascending
    pub migrated_periods: Vec<u32>,
    /// Current period after migration
    pub current_period: Option<u32>,
    /// Keys the final flush failed to write
    pub flush_failures: usize,
}

/// Legacy data that is not fully represented under the period keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// A migrated period has fewer records than its legacy data
    MissingRecords {
        /// Entity kind of the period
        kind: EntityKind,
        /// Period index
        period: u32,
        /// Records in the legacy blob
        legacy_records: usize,
        /// Records found under the period key
        migrated_records: usize,
    },
    /// A legacy period could not be decoded, so nothing was migrated for it
    UnreadablePeriod {
        /// Entity kind of the blob
        kind: EntityKind,
        /// Index as written in the blob
        index: String,
        /// Entries in the raw period
        legacy_records: usize,
        /// Decode error
        reason: String,
    },
    /// The legacy blob could not be decoded at all
    UnreadableBlob {
        /// Entity kind of the blob
        kind: EntityKind,
        /// Decode error
        reason: String,
    },
}

impl VerificationError {
    /// Entity kind the error concerns
    pub fn kind(&self) -> EntityKind {
        match self {
            VerificationError::MissingRecords { kind, .. }
            | VerificationError::UnreadablePeriod { kind, .. }
            | VerificationError::UnreadableBlob { kind, .. } => *kind,
        }
    }
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationError::MissingRecords {
                kind,
                period,
                legacy_records,
                migrated_records,
            } => write!(
                f,
                "{kind} period {period}: {legacy_records} legacy records, {migrated_records} migrated"
            ),
            VerificationError::UnreadablePeriod {
                kind,
                index,
                legacy_records,
                reason,
            } => write!(
                f,
                "{kind} period {index}: {legacy_records} legacy records not migrated ({reason})"
            ),
            VerificationError::UnreadableBlob { kind, reason } => {
                write!(f, "legacy {kind} data unreadable: {reason}")
            }
        }
    }
}

/// Outcome of [`MigrationManager::verify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// `true` when no period lost records
    pub success: bool,
    /// Periods with missing records
    pub errors: Vec<VerificationError>,
}
