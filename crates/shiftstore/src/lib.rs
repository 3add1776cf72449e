//! # Shiftstore
//!
//! Period-keyed storage for schedules and staff lists, with a bounded TTL
//! cache, debounced batch writes, quota recovery and a one-time migration
//! from the legacy single-blob layout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shiftstore::{ScheduleValue, StaffRecord, StaffValue};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Opens (or creates) a file-backed store and migrates legacy data
//!     let store = shiftstore::open("./shift_data")?;
//!
//!     // Schedule edits are cached at once and written after a short debounce
//!     let schedule = ScheduleValue::new().with("s1", "2025-01-01", "early");
//!     store.save_schedule(0, schedule)?;
//!
//!     // Staff lists are written immediately
//!     store.save_staff(0, StaffValue::new(vec![StaffRecord::new("s1", "Ana")]))?;
//!
//!     // Reads see the latest save, queued or not
//!     assert!(store.get_schedule(0)?.is_some());
//!
//!     // Flush pending writes before exit
//!     store.shutdown()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Store Modes
//!
//! ```rust,no_run
//! // Durable, one file per key
//! let persistent = shiftstore::open("./data")?;
//!
//! // In-memory, lost on exit
//! let memory = shiftstore::in_memory()?;
//! # Ok::<(), shiftstore::Error>(())
//! ```
//!
//! Any other host store can be plugged in through [`KeyValueStore`] and
//! [`open_store`].

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub mod logging;

// Re-export core types
pub use shiftstore_core::{
    Clock, EntityKind, Error, ManualClock, Result, ScheduleValue, StaffRecord, StaffValue,
    StorageKey, StoredValue, SystemClock,
};

// Storage components
pub use shiftstore_storage::{
    BatchConfig, CacheConfig, CacheStats, CancelToken, CleanupReport, FileStore, FlushReport,
    KeyValueStore, ManualScheduler, MemoryStore, PeriodStore, QuotaConfig, QuotaStatus,
    SaveOutcome, Scheduler, StoreConfig, StoreError, ThreadScheduler, UsageStats,
};

// Migration components
pub use shiftstore_migration::{
    MigrationManager, MigrationReport, MigrationState, VerificationError, VerificationReport,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Opens a file-backed store in `path` with the default configuration.
///
/// Creates the directory if it doesn't exist and migrates legacy data
/// found there.
///
/// # Examples
///
/// ```rust,no_run
/// let store = shiftstore::open("./shift_data")?;
/// println!("current period: {:?}", store.current_period()?);
/// # Ok::<(), shiftstore::Error>(())
/// ```
pub fn open<P: AsRef<Path>>(path: P) -> Result<PeriodStore> {
    open_with_config(path, StoreConfig::default())
}

/// Opens a file-backed store in `path` with a custom configuration
pub fn open_with_config<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<PeriodStore> {
    let path = path.as_ref();
    info!(path = %path.display(), "opening shiftstore");
    open_store(Arc::new(FileStore::open(path)?), config)
}

/// Opens a store over a fresh [`MemoryStore`].
///
/// ```rust
/// let store = shiftstore::in_memory()?;
/// assert_eq!(store.current_period()?, None);
/// # Ok::<(), shiftstore::Error>(())
/// ```
pub fn in_memory() -> Result<PeriodStore> {
    open_store(Arc::new(MemoryStore::new()), StoreConfig::default())
}

/// Opens a store over any host store and runs the legacy migration.
///
/// A failed verification leaves the legacy data in place and is logged; the
/// store is returned either way since period keys stay usable.
pub fn open_store(host: Arc<dyn KeyValueStore>, config: StoreConfig) -> Result<PeriodStore> {
    let store = PeriodStore::open_with_config(host, config)?;
    match MigrationManager::new(&store).run()? {
        MigrationState::VerificationFailed => {
            warn!("legacy data kept after failed verification")
        }
        state => info!(?state, "store ready"),
    }
    Ok(store)
}
