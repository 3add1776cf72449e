//! # Shiftstore Storage
//!
//! Cache, write batching and quota handling for shiftstore.
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
//! The layer sits between application code and a slow, quota-limited,
//! synchronous host key-value store:
//!
//! - **MemoryCache**: TTL-bounded read cache that also holds unflushed writes
//! - **BatchWriter**: debounced, per-key coalescing write queue
//! - **QuotaMonitor**: capacity probes, cleanup and retry on exhaustion
//! - **PeriodStore**: the read/write API tying them together
//!
//! ## Architecture
//!
//! ```text
//! save → MemoryCache → BatchWriter ──(500 ms quiet)──→ QuotaMonitor → host store
//!                    ↘ staff lists: immediate write ──↗
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod cache;
pub mod file_store;
pub mod kv;
pub mod quota;
pub mod scheduler;
pub mod store;

pub use batch::{BatchConfig, BatchWriter, FlushReport, QueueOutcome};
pub use cache::{CacheConfig, CacheEntry, CacheStats, MemoryCache};
pub use file_store::FileStore;
pub use kv::{KeyValueStore, MemoryStore, StoreAdapter, StoreError};
pub use quota::{CleanupReport, QuotaConfig, QuotaMonitor, QuotaStatus, PROBE_KEY_PREFIX};
pub use scheduler::{CancelToken, ManualScheduler, Scheduler, Task, ThreadScheduler};
pub use store::{PeriodStore, SaveOutcome, StoreConfig, UsageStats};
