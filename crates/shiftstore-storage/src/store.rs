//! PeriodStore - the read/write API used by application code
//!
//! ```text
//! get  → MemoryCache ─miss→ write queue ─miss→ host store (populates cache)
//! save → MemoryCache ─┬─ staff:  QuotaMonitor::write now, queue on failure
//!                     └─ other:  BatchWriter (debounced)
//! ```

use crate::batch::{BatchConfig, BatchWriter, FlushReport, QueueOutcome};
use crate::cache::{CacheConfig, CacheStats, MemoryCache};
use crate::kv::{KeyValueStore, StoreAdapter};
use crate::quota::{CleanupReport, QuotaConfig, QuotaMonitor, QuotaStatus};
use crate::scheduler::{CancelToken, Scheduler, ThreadScheduler};
use shiftstore_core::format_version::{store_version, STORE_FORMAT_VERSION};
use shiftstore_core::{
    keys, Clock, EntityKind, Error, Result, ScheduleValue, StaffValue, StorageKey, StoredValue,
    SystemClock,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default interval between maintenance cleanups (1 minute)
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Memory cache settings
    pub cache: CacheConfig,
    /// Write batching settings
    pub batch: BatchConfig,
    /// Quota monitor settings
    pub quota: QuotaConfig,
    /// Interval of the periodic cleanup; `None` disables it
    pub cleanup_interval: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            batch: BatchConfig::default(),
            quota: QuotaConfig::default(),
            cleanup_interval: Some(DEFAULT_CLEANUP_INTERVAL),
        }
    }
}

impl StoreConfig {
    /// Set the cache configuration
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the batching configuration
    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    /// Set the quota configuration
    pub fn with_quota(mut self, quota: QuotaConfig) -> Self {
        self.quota = quota;
        self
    }

    /// Set the cleanup interval; zero or `None` disables periodic cleanup
    pub fn with_cleanup_interval(mut self, interval: Option<Duration>) -> Self {
        self.cleanup_interval = interval.filter(|d| !d.is_zero());
        self
    }
}

/// How a save was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written to the host store immediately
    Persisted,
    /// Waiting in the write queue
    Queued,
    /// The immediate write failed; the value was queued instead
    Deferred,
    /// A newer durable value exists; the save was discarded
    DroppedStale,
}

impl From<QueueOutcome> for SaveOutcome {
    fn from(outcome: QueueOutcome) -> Self {
        match outcome {
            QueueOutcome::Queued => SaveOutcome::Queued,
            QueueOutcome::DroppedStale => SaveOutcome::DroppedStale,
        }
    }
}

/// Operational statistics
#[derive(Debug, Clone, PartialEq)]
pub struct UsageStats {
    /// Estimated bytes used in the host store
    pub store_bytes: usize,
    /// Cache occupancy
    pub cache: CacheStats,
    /// Entries waiting in the write queue
    pub pending_writes: usize,
    /// Debounced writes that failed and were not yet taken with
    /// [`PeriodStore::take_flush_failures`]
    pub failed_writes: usize,
}

#[derive(Default)]
struct Maintenance {
    timer: Option<CancelToken>,
    stopped: bool,
}

/// Cached, batched access to period-keyed data in a host store.
///
/// Call [`PeriodStore::shutdown`] from the host's shutdown hook. A store
/// dropped without shutdown still attempts a final flush.
pub struct PeriodStore {
    store: StoreAdapter,
    cache: Arc<Mutex<MemoryCache>>,
    quota: Arc<QuotaMonitor>,
    batch: BatchWriter,
    scheduler: Arc<dyn Scheduler>,
    maintenance: Arc<Mutex<Maintenance>>,
    shut_down: AtomicBool,
}

impl PeriodStore {
    /// Opens a store over `store` with default configuration
    pub fn open(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::open_with_config(store, StoreConfig::default())
    }

    /// Opens a store with custom configuration, OS timers and the system clock
    pub fn open_with_config(store: Arc<dyn KeyValueStore>, config: StoreConfig) -> Result<Self> {
        Self::open_with_runtime(
            store,
            config,
            Arc::new(ThreadScheduler::new()?),
            Arc::new(SystemClock),
        )
    }

    /// Opens a store with an explicit scheduler and clock
    pub fn open_with_runtime(
        store: Arc<dyn KeyValueStore>,
        config: StoreConfig,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = StoreAdapter::new(store);
        let cache = Arc::new(Mutex::new(MemoryCache::with_config(
            config.cache.clone(),
            Arc::clone(&clock),
        )));
        let quota = Arc::new(QuotaMonitor::new(
            store.clone(),
            Arc::clone(&cache),
            config.quota.clone(),
            clock,
        ));
        let batch = BatchWriter::new(
            store.clone(),
            Arc::clone(&quota),
            Arc::clone(&cache),
            Arc::clone(&scheduler),
            config.batch.clone(),
        );

        let period_store = Self {
            store,
            cache,
            quota,
            batch,
            scheduler,
            maintenance: Arc::new(Mutex::new(Maintenance::default())),
            shut_down: AtomicBool::new(false),
        };

        period_store.check_format_version()?;
        if let Some(interval) = config.cleanup_interval {
            arm_cleanup(
                Arc::clone(&period_store.scheduler),
                Arc::downgrade(&period_store.quota),
                Arc::clone(&period_store.maintenance),
                interval,
            );
        }

        Ok(period_store)
    }

    /// Rejects stores written by a newer layout and stamps older ones
    fn check_format_version(&self) -> Result<()> {
        let key = StorageKey::cache_version();
        let found = self
            .store
            .read(&key)
            .and_then(|v| v.as_meta().and_then(|m| m.as_u64()))
            .and_then(|v| u32::try_from(v).ok());

        let version = store_version();
        if let Some(found) = found {
            if !version.can_read(found) {
                return Err(Error::IncompatibleFormat {
                    found,
                    supported: version.current,
                });
            }
        }

        if version.needs_stamp(found) {
            let stamp = StoredValue::Meta(serde_json::json!(STORE_FORMAT_VERSION));
            if let Err(e) = self.quota.write(&key, &stamp) {
                warn!(error = %e, "could not stamp store format version");
            }
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(Error::InvalidOperation("store is shut down".to_string()));
        }
        Ok(())
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, MemoryCache>> {
        self.cache.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Reads the current value under `key`.
    ///
    /// Cached and queued values take precedence over the host store. Values
    /// that fail to decode read as absent.
    pub fn get(&self, key: &StorageKey) -> Result<Option<StoredValue>> {
        if let Some(value) = self.lock_cache()?.get(key) {
            return Ok(Some(value));
        }

        let seen_revision = self.batch.revision(key)?;
        let value = match self.batch.pending_value(key) {
            Some(pending) => Some(pending),
            None => self.store.read(key),
        };
        if let Some(value) = &value {
            self.batch.fill_cache(key, value.clone(), seen_revision)?;
        }
        Ok(value)
    }

    /// Saves `value` under `key`.
    ///
    /// The cache reflects the new value immediately. Staff lists are written
    /// to the host store right away and fall back to the write queue on
    /// failure; everything else goes through the write queue.
    pub fn save(&self, key: &StorageKey, value: StoredValue) -> Result<SaveOutcome> {
        self.ensure_open()?;
        if key.kind() != value.kind() {
            return Err(Error::KindMismatch {
                key: key.to_string(),
                found: value.kind_name(),
            });
        }

        if key.kind() != Some(EntityKind::Staff) {
            return self.batch.queue_write(key.clone(), value).map(Into::into);
        }

        Ok(match self.batch.write_now(key.clone(), value)? {
            None => {
                debug!(key = %key, "staff list persisted immediately");
                SaveOutcome::Persisted
            }
            Some(QueueOutcome::Queued) => SaveOutcome::Deferred,
            Some(QueueOutcome::DroppedStale) => SaveOutcome::DroppedStale,
        })
    }

    /// Removes `key` from the cache, the write queue and the host store
    pub fn delete(&self, key: &StorageKey) -> Result<()> {
        self.ensure_open()?;
        self.batch.delete(key)
    }

    /// The schedule of period `index`
    pub fn get_schedule(&self, index: u32) -> Result<Option<ScheduleValue>> {
        Ok(match self.get(&StorageKey::schedule(index))? {
            Some(StoredValue::Schedule(schedule)) => Some(schedule),
            _ => None,
        })
    }

    /// Saves the schedule of period `index`
    pub fn save_schedule(&self, index: u32, schedule: ScheduleValue) -> Result<SaveOutcome> {
        self.save(&StorageKey::schedule(index), schedule.into())
    }

    /// The staff list of period `index`
    pub fn get_staff(&self, index: u32) -> Result<Option<StaffValue>> {
        Ok(match self.get(&StorageKey::staff(index))? {
            Some(StoredValue::Staff(staff)) => Some(staff),
            _ => None,
        })
    }

    /// Saves the staff list of period `index`
    pub fn save_staff(&self, index: u32, staff: StaffValue) -> Result<SaveOutcome> {
        self.save(&StorageKey::staff(index), staff.into())
    }

    /// The period the application last worked on
    pub fn current_period(&self) -> Result<Option<u32>> {
        Ok(self
            .get(&StorageKey::current_period())?
            .and_then(|v| v.as_meta().and_then(|m| m.as_u64()))
            .and_then(|v| u32::try_from(v).ok()))
    }

    /// Records the period the application works on
    pub fn set_current_period(&self, index: u32) -> Result<SaveOutcome> {
        self.save(
            &StorageKey::current_period(),
            StoredValue::Meta(serde_json::json!(index)),
        )
    }

    /// Period indices of `kind` that are stored or queued, ascending
    pub fn periods(&self, kind: EntityKind) -> Vec<u32> {
        let stored = self.store.keys();
        let pending = self.batch.pending_keys();
        keys::periods_of(
            kind,
            stored
                .iter()
                .map(String::as_str)
                .chain(pending.iter().map(StorageKey::as_str)),
        )
    }

    /// Writes every queued entry now
    pub fn flush(&self) -> Result<FlushReport> {
        self.batch.flush_all()
    }

    /// Number of queued writes
    pub fn pending_count(&self) -> usize {
        self.batch.pending_count()
    }

    /// Runs a cleanup pass now
    pub fn cleanup(&self) -> Result<CleanupReport> {
        self.quota.cleanup()
    }

    /// Checks remaining host store capacity
    pub fn check_quota(&self) -> Result<QuotaStatus> {
        self.quota.check_quota()
    }

    /// Store, cache and queue statistics
    pub fn usage_stats(&self) -> Result<UsageStats> {
        Ok(UsageStats {
            store_bytes: self.store.usage_bytes(),
            cache: self.lock_cache()?.stats(),
            pending_writes: self.batch.pending_count(),
            failed_writes: self.batch.failure_count(),
        })
    }

    /// Takes the writes that debounced flushes failed to persist.
    ///
    /// Those values were already retried once after a cleanup. They remain
    /// readable from the cache until evicted; saving them again queues them
    /// for another attempt.
    pub fn take_flush_failures(&self) -> Vec<(StorageKey, Error)> {
        self.batch.take_failures()
    }

    /// Drops every cached entry; the next reads go to the host store
    pub fn clear_cache(&self) -> Result<()> {
        self.lock_cache()?.clear();
        Ok(())
    }

    /// Direct access to the host store, bypassing cache and queue
    pub fn durable(&self) -> &StoreAdapter {
        &self.store
    }

    /// Stops maintenance and flushes the write queue.
    ///
    /// Later saves and deletes fail; reads keep working.
    pub fn shutdown(&self) -> Result<FlushReport> {
        self.shut_down.store(true, Ordering::SeqCst);
        self.stop_maintenance();
        let report = self.batch.flush_all()?;
        info!(written = report.written, failed = report.failed.len(), "store shut down");
        Ok(report)
    }

    /// Returns `true` once [`PeriodStore::shutdown`] ran
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn stop_maintenance(&self) {
        if let Ok(mut maintenance) = self.maintenance.lock() {
            maintenance.stopped = true;
            if let Some(timer) = maintenance.timer.take() {
                timer.cancel();
            }
        }
    }
}

impl Drop for PeriodStore {
    fn drop(&mut self) {
        if self.is_shut_down() {
            return;
        }
        // Best effort flush on drop
        if let Err(e) = self.shutdown() {
            error!(error = %e, "final flush on drop failed");
        }
    }
}

/// Schedules a cleanup pass that re-arms itself until maintenance stops
fn arm_cleanup(
    scheduler: Arc<dyn Scheduler>,
    quota: Weak<QuotaMonitor>,
    maintenance: Arc<Mutex<Maintenance>>,
    interval: Duration,
) {
    let Ok(mut slot) = maintenance.lock() else {
        return;
    };
    if slot.stopped {
        return;
    }

    let task_scheduler: Weak<dyn Scheduler> = Arc::downgrade(&scheduler);
    let task_maintenance = Arc::clone(&maintenance);
    let timer = scheduler.after(
        interval,
        Box::new(move || {
            let (Some(monitor), Some(scheduler)) = (quota.upgrade(), task_scheduler.upgrade())
            else {
                return;
            };
            if let Err(e) = monitor.cleanup() {
                error!(error = %e, "periodic cleanup failed");
            }
            drop(monitor);
            arm_cleanup(scheduler, quota, task_maintenance, interval);
        }),
    );
    slot.timer = Some(timer);
}
