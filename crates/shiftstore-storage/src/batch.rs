//! BatchWriter - debounced write coalescing
//!
//! Writes are held in a queue with at most one entry per key. Each
//! [`BatchWriter::queue_write`] restarts the debounce timer, so the queue is
//! flushed only after the configured quiet period. Within that window the
//! last value written to a key wins.
//!
//! Every save of a key is stamped with a revision. A flush writes an entry
//! and mirrors it into the cache only while that entry is still the key's
//! latest revision, so a save racing with the flush is never rolled back.
//!
//! Staff lists also have an immediate write path, which can race with a
//! queued older list. A queued staff list is therefore dropped whenever the
//! durable list carries strictly newer modification timestamps, both when
//! it is queued and again when it is flushed.

use crate::cache::MemoryCache;
use crate::kv::StoreAdapter;
use crate::quota::QuotaMonitor;
use crate::scheduler::{CancelToken, Scheduler};
use shiftstore_core::{EntityKind, Error, Result, StorageKey, StoredValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default quiet period before a flush (500 ms)
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Write batching configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Quiet period after the last queued write before the queue is flushed
    pub debounce: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl BatchConfig {
    /// Set the debounce delay
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// What happened to a queued write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// The value waits in the queue for the next flush
    Queued,
    /// The durable value is newer; the write was discarded
    DroppedStale,
}

/// Summary of a flush pass
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Entries written to the store
    pub written: usize,
    /// Staff entries skipped because the durable list was newer
    pub skipped_stale: usize,
    /// Entries skipped because the key was saved or deleted again meanwhile
    pub superseded: usize,
    /// Entries whose write failed; they are no longer queued
    pub failed: Vec<(StorageKey, Error)>,
}

impl FlushReport {
    /// Returns `true` if no entry failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Keys whose write failed
    pub fn failed_keys(&self) -> Vec<&StorageKey> {
        self.failed.iter().map(|(k, _)| k).collect()
    }
}

struct QueuedWrite {
    value: StoredValue,
    revision: u64,
}

#[derive(Default)]
struct WriteQueue {
    entries: HashMap<StorageKey, QueuedWrite>,
    /// Revision of the latest save or delete per key
    revisions: HashMap<StorageKey, u64>,
    last_revision: u64,
    timer: Option<CancelToken>,
}

impl WriteQueue {
    fn next_revision(&mut self, key: &StorageKey) -> u64 {
        self.last_revision += 1;
        self.revisions.insert(key.clone(), self.last_revision);
        self.last_revision
    }

    fn is_latest(&self, key: &StorageKey, revision: u64) -> bool {
        self.revisions.get(key).copied().unwrap_or(0) == revision
    }
}

struct BatchInner {
    queue: Mutex<WriteQueue>,
    /// Serializes host writes of the flush with immediate writes
    write_lock: Mutex<()>,
    /// Failures of timer-driven flushes, kept until taken
    timer_failures: Mutex<Vec<(StorageKey, Error)>>,
    store: StoreAdapter,
    quota: Arc<QuotaMonitor>,
    cache: Arc<Mutex<MemoryCache>>,
    scheduler: Arc<dyn Scheduler>,
    config: BatchConfig,
}

/// Debounced, coalescing write queue.
///
/// Owns every cache update made on behalf of a save, so that cache writes
/// are ordered by save revision. Cheap to clone; clones share the same
/// queue.
#[derive(Clone)]
pub struct BatchWriter {
    inner: Arc<BatchInner>,
}

impl BatchWriter {
    /// Creates a writer flushing through `quota` and mirroring into `cache`
    pub fn new(
        store: StoreAdapter,
        quota: Arc<QuotaMonitor>,
        cache: Arc<Mutex<MemoryCache>>,
        scheduler: Arc<dyn Scheduler>,
        config: BatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(BatchInner {
                queue: Mutex::new(WriteQueue::default()),
                write_lock: Mutex::new(()),
                timer_failures: Mutex::new(Vec::new()),
                store,
                quota,
                cache,
                scheduler,
                config,
            }),
        }
    }

    /// Puts `value` in the cache and queues it for `key`, restarting the
    /// debounce timer.
    ///
    /// A staff list older than the durable one is dropped and the cache is
    /// pointed back at the durable list.
    pub fn queue_write(&self, key: StorageKey, value: StoredValue) -> Result<QueueOutcome> {
        let revision = self.inner.stage(&key, &value)?;
        self.inner.enqueue(key, value, revision)
    }

    /// Puts `value` in the cache and writes it to the host store at once.
    ///
    /// Returns `None` once written; an older queued entry for `key` is
    /// dropped. If the write fails the value is queued instead and the queue
    /// outcome is returned.
    pub fn write_now(&self, key: StorageKey, value: StoredValue) -> Result<Option<QueueOutcome>> {
        let revision = self.inner.stage(&key, &value)?;

        let written = {
            let _writing = self.inner.lock_writes()?;
            self.inner.quota.write(&key, &value)
        };
        match written {
            Ok(()) => {
                let mut queue = self.inner.lock_queue()?;
                if queue.entries.get(&key).is_some_and(|e| e.revision < revision) {
                    queue.entries.remove(&key);
                    debug!(key = %key, "older queued write superseded");
                }
                Ok(None)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "immediate write failed, queueing instead");
                self.inner.enqueue(key, value, revision).map(Some)
            }
        }
    }

    /// Removes `key` from the cache, the queue and the host store
    pub fn delete(&self, key: &StorageKey) -> Result<()> {
        {
            let mut queue = self.inner.lock_queue()?;
            queue.next_revision(key);
            queue.entries.remove(key);
            if queue.entries.is_empty() {
                if let Some(timer) = queue.timer.take() {
                    timer.cancel();
                }
            }
            self.inner.lock_cache()?.delete(key);
        }
        let _writing = self.inner.lock_writes()?;
        self.inner.store.remove(key)
    }

    /// Current save revision of `key`; 0 if it was never saved
    pub fn revision(&self, key: &StorageKey) -> Result<u64> {
        Ok(self
            .inner
            .lock_queue()?
            .revisions
            .get(key)
            .copied()
            .unwrap_or(0))
    }

    /// Caches a value read from the host store, unless `key` was saved or
    /// deleted since `seen_revision` was taken
    pub fn fill_cache(&self, key: &StorageKey, value: StoredValue, seen_revision: u64) -> Result<()> {
        let queue = self.inner.lock_queue()?;
        if queue.is_latest(key, seen_revision) {
            self.inner.lock_cache()?.set(key.clone(), value);
        }
        Ok(())
    }

    /// Writes every queued entry, then empties the queue and cancels the timer
    pub fn flush_all(&self) -> Result<FlushReport> {
        self.inner.flush_all()
    }

    /// Failures of debounced flushes since the last call.
    ///
    /// Forced flushes report their failures in their [`FlushReport`] instead.
    pub fn take_failures(&self) -> Vec<(StorageKey, Error)> {
        self.inner
            .timer_failures
            .lock()
            .map(|mut f| std::mem::take(&mut *f))
            .unwrap_or_default()
    }

    /// Number of debounced-flush failures not yet taken
    pub fn failure_count(&self) -> usize {
        self.inner.timer_failures.lock().map(|f| f.len()).unwrap_or(0)
    }

    /// The queued value for `key`, if any
    pub fn pending_value(&self, key: &StorageKey) -> Option<StoredValue> {
        self.inner
            .queue
            .lock()
            .ok()
            .and_then(|q| q.entries.get(key).map(|e| e.value.clone()))
    }

    /// Keys currently queued
    pub fn pending_keys(&self) -> Vec<StorageKey> {
        self.inner
            .queue
            .lock()
            .map(|q| q.entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of queued entries
    pub fn pending_count(&self) -> usize {
        self.inner
            .queue
            .lock()
            .map(|q| q.entries.len())
            .unwrap_or(0)
    }
}

impl BatchInner {
    fn lock_queue(&self) -> Result<MutexGuard<'_, WriteQueue>> {
        self.queue.lock().map_err(|_| Error::LockPoisoned)
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, MemoryCache>> {
        self.cache.lock().map_err(|_| Error::LockPoisoned)
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Assigns the next revision of `key` and caches `value` under it
    fn stage(&self, key: &StorageKey, value: &StoredValue) -> Result<u64> {
        let mut queue = self.lock_queue()?;
        let revision = queue.next_revision(key);
        self.lock_cache()?.set(key.clone(), value.clone());
        Ok(revision)
    }

    /// Caches `value` if `revision` is still the latest for `key`.
    ///
    /// Queue lock before cache lock, as in [`BatchInner::stage`].
    fn mirror(&self, key: &StorageKey, value: StoredValue, revision: u64) -> Result<bool> {
        let queue = self.lock_queue()?;
        if !queue.is_latest(key, revision) {
            return Ok(false);
        }
        self.lock_cache()?.set(key.clone(), value);
        Ok(true)
    }

    fn enqueue(
        self: &Arc<Self>,
        key: StorageKey,
        value: StoredValue,
        revision: u64,
    ) -> Result<QueueOutcome> {
        if let Some(durable) = self.newer_durable(&key, &value) {
            info!(key = %key, "dropping stale staff write, durable data is newer");
            self.mirror(&key, durable, revision)?;
            return Ok(QueueOutcome::DroppedStale);
        }

        let mut queue = self.lock_queue()?;
        if !queue.is_latest(&key, revision) {
            // A later save of this key queues its own value.
            debug!(key = %key, "write superseded before queueing");
            return Ok(QueueOutcome::Queued);
        }
        queue.entries.insert(key, QueuedWrite { value, revision });
        if let Some(timer) = queue.timer.take() {
            timer.cancel();
        }

        let weak: Weak<BatchInner> = Arc::downgrade(self);
        let timer = self.scheduler.after(
            self.config.debounce,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.flush_on_timer();
                }
            }),
        );
        queue.timer = Some(timer);

        debug!(pending = queue.entries.len(), "write queued");
        Ok(QueueOutcome::Queued)
    }

    /// The durable staff list under `key` when it is strictly newer than `value`
    fn newer_durable(&self, key: &StorageKey, value: &StoredValue) -> Option<StoredValue> {
        if key.kind() != Some(EntityKind::Staff) {
            return None;
        }
        let StoredValue::Staff(incoming) = value else {
            return None;
        };
        match self.store.read(key)? {
            StoredValue::Staff(durable) if durable.is_newer_than(incoming) => {
                Some(StoredValue::Staff(durable))
            }
            _ => None,
        }
    }

    fn flush_all(&self) -> Result<FlushReport> {
        let entries = {
            let mut queue = self.lock_queue()?;
            if let Some(timer) = queue.timer.take() {
                timer.cancel();
            }
            std::mem::take(&mut queue.entries)
        };

        let mut report = FlushReport::default();
        if entries.is_empty() {
            return Ok(report);
        }

        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        // Every taken entry ends up in the report, even on lock failures.
        for (key, entry) in entries {
            if let Err(e) = self.flush_entry(&key, entry, &mut report) {
                error!(key = %key, error = %e, "queued write failed");
                report.failed.push((key, e));
            }
        }

        info!(
            written = report.written,
            skipped_stale = report.skipped_stale,
            superseded = report.superseded,
            failed = report.failed.len(),
            "write queue flushed"
        );
        Ok(report)
    }

    fn flush_entry(&self, key: &StorageKey, entry: QueuedWrite, report: &mut FlushReport) -> Result<()> {
        let _writing = self.lock_writes()?;
        if !self.lock_queue()?.is_latest(key, entry.revision) {
            debug!(key = %key, "queued write superseded by a later save");
            report.superseded += 1;
            return Ok(());
        }

        if let Some(durable) = self.newer_durable(key, &entry.value) {
            info!(key = %key, "skipping stale staff write at flush");
            report.skipped_stale += 1;
            self.mirror_logged(key, durable, entry.revision);
            return Ok(());
        }

        self.quota.write(key, &entry.value)?;
        report.written += 1;
        self.mirror_logged(key, entry.value, entry.revision);
        Ok(())
    }

    /// Mirrors a flushed value; the host write already happened, so a
    /// failure here only costs a cache refresh
    fn mirror_logged(&self, key: &StorageKey, value: StoredValue, revision: u64) {
        if let Err(e) = self.mirror(key, value, revision) {
            error!(key = %key, error = %e, "could not mirror flushed write into cache");
        }
    }

    fn flush_on_timer(&self) {
        match self.flush_all() {
            Ok(report) if !report.is_clean() => {
                error!(failed = report.failed.len(), "debounced flush left writes unpersisted");
                match self.timer_failures.lock() {
                    Ok(mut failures) => failures.extend(report.failed),
                    Err(_) => error!("flush failure log poisoned"),
                }
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "debounced flush aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::kv::{KeyValueStore, MemoryStore};
    use crate::quota::QuotaConfig;
    use crate::scheduler::ManualScheduler;
    use chrono::{TimeZone, Utc};
    use shiftstore_core::{ManualClock, ScheduleValue, StaffRecord, StaffValue};

    struct Fixture {
        store: Arc<MemoryStore>,
        cache: Arc<Mutex<MemoryCache>>,
        scheduler: ManualScheduler,
        writer: BatchWriter,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock: Arc<dyn shiftstore_core::Clock> = Arc::new(ManualClock::new());
        let adapter = StoreAdapter::new(store.clone());
        let cache = Arc::new(Mutex::new(MemoryCache::with_config(
            CacheConfig::default(),
            Arc::clone(&clock),
        )));
        let quota = Arc::new(QuotaMonitor::new(
            adapter.clone(),
            Arc::clone(&cache),
            QuotaConfig::default(),
            clock,
        ));
        let scheduler = ManualScheduler::new();
        let writer = BatchWriter::new(
            adapter,
            quota,
            Arc::clone(&cache),
            Arc::new(scheduler.clone()),
            BatchConfig::default(),
        );
        Fixture {
            store,
            cache,
            scheduler,
            writer,
        }
    }

    fn schedule(shift: &str) -> StoredValue {
        ScheduleValue::new().with("A", "2025-01-01", shift).into()
    }

    fn staff_at(secs: i64) -> StoredValue {
        let at = Utc.timestamp_opt(secs, 0).unwrap();
        StaffValue::new(vec![StaffRecord::new("s1", "Ana").modified_at(at)]).into()
    }

    #[test]
    fn test_debounce_restarts_on_each_write() {
        let f = fixture();
        let key = StorageKey::schedule(0);

        f.writer.queue_write(key.clone(), schedule("early")).unwrap();
        f.scheduler.advance(Duration::from_millis(400));
        f.writer.queue_write(key.clone(), schedule("late")).unwrap();
        f.scheduler.advance(Duration::from_millis(400));
        assert!(f.store.get("schedule-0").is_none(), "window restarted");
        assert_eq!(f.writer.pending_count(), 1);

        f.scheduler.advance(Duration::from_millis(100));
        assert_eq!(f.writer.pending_count(), 0);
        let stored = StoredValue::decode(&key, &f.store.get("schedule-0").unwrap()).unwrap();
        assert_eq!(stored, schedule("late"));
        assert_eq!(f.scheduler.pending(), 0);
    }

    #[test]
    fn test_flush_mirrors_into_cache() {
        let f = fixture();
        f.writer
            .queue_write(StorageKey::schedule(1), schedule("off"))
            .unwrap();
        let report = f.writer.flush_all().unwrap();
        assert_eq!(report.written, 1);
        assert!(report.is_clean());
        assert_eq!(
            f.cache.lock().unwrap().get(&StorageKey::schedule(1)),
            Some(schedule("off"))
        );
        // The forced flush cancelled the timer.
        assert_eq!(f.scheduler.pending(), 0);
    }

    #[test]
    fn test_stale_staff_write_dropped() {
        let f = fixture();
        let key = StorageKey::staff(0);
        f.store.set("staff-0", &staff_at(200).encode().unwrap()).unwrap();

        let outcome = f.writer.queue_write(key.clone(), staff_at(100)).unwrap();
        assert_eq!(outcome, QueueOutcome::DroppedStale);
        assert_eq!(f.writer.pending_count(), 0);
        assert_eq!(f.cache.lock().unwrap().get(&key), Some(staff_at(200)));

        let outcome = f.writer.queue_write(key, staff_at(200)).unwrap();
        assert_eq!(outcome, QueueOutcome::Queued, "equal timestamps are not stale");
    }

    #[test]
    fn test_stale_check_repeated_at_flush() {
        let f = fixture();
        let key = StorageKey::staff(2);
        f.writer.queue_write(key.clone(), staff_at(100)).unwrap();

        // A fresher list lands through another path before the flush.
        f.store.set("staff-2", &staff_at(300).encode().unwrap()).unwrap();

        let report = f.writer.flush_all().unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.skipped_stale, 1);
        let stored = StoredValue::decode(&key, &f.store.get("staff-2").unwrap()).unwrap();
        assert_eq!(stored, staff_at(300));
    }

    #[test]
    fn test_delete_drops_queued_entry() {
        let f = fixture();
        let key = StorageKey::schedule(3);
        f.writer.queue_write(key.clone(), schedule("early")).unwrap();
        assert_eq!(f.writer.pending_value(&key), Some(schedule("early")));

        f.writer.delete(&key).unwrap();
        assert_eq!(f.writer.pending_value(&key), None);
        assert!(f.cache.lock().unwrap().get(&key).is_none());
        assert_eq!(f.scheduler.pending(), 0);
        assert_eq!(f.scheduler.advance(Duration::from_secs(1)), 0);
        assert!(f.store.get("schedule-3").is_none());
    }

    /// Host store that runs a callback on its first write to one key
    struct HookedStore {
        inner: MemoryStore,
        key: &'static str,
        hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl KeyValueStore for HookedStore {
        fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &[u8]) -> std::result::Result<(), crate::kv::StoreError> {
            self.inner.set(key, value)?;
            if key == self.key {
                let hook = self.hook.lock().unwrap().take();
                if let Some(hook) = hook {
                    hook();
                }
            }
            Ok(())
        }

        fn remove(&self, key: &str) -> std::result::Result<(), crate::kv::StoreError> {
            self.inner.remove(key)
        }

        fn keys(&self) -> Vec<String> {
            self.inner.keys()
        }
    }

    #[test]
    fn test_save_during_flush_keeps_newer_value() {
        let host = Arc::new(HookedStore {
            inner: MemoryStore::new(),
            key: "schedule-0",
            hook: Mutex::new(None),
        });
        let clock: Arc<dyn shiftstore_core::Clock> = Arc::new(ManualClock::new());
        let adapter = StoreAdapter::new(host.clone());
        let cache = Arc::new(Mutex::new(MemoryCache::with_config(
            CacheConfig::default(),
            Arc::clone(&clock),
        )));
        let quota = Arc::new(QuotaMonitor::new(
            adapter.clone(),
            Arc::clone(&cache),
            QuotaConfig::default(),
            clock,
        ));
        let scheduler = ManualScheduler::new();
        let writer = BatchWriter::new(
            adapter,
            quota,
            Arc::clone(&cache),
            Arc::new(scheduler.clone()),
            BatchConfig::default(),
        );

        let key = StorageKey::schedule(0);
        writer.queue_write(key.clone(), schedule("early")).unwrap();

        // Another save of the key lands while "early" is being written.
        let racing = writer.clone();
        let racing_key = key.clone();
        *host.hook.lock().unwrap() = Some(Box::new(move || {
            racing.queue_write(racing_key, schedule("off")).unwrap();
        }));

        let report = writer.flush_all().unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(cache.lock().unwrap().get(&key), Some(schedule("off")));
        assert_eq!(writer.pending_value(&key), Some(schedule("off")));

        scheduler.advance(Duration::from_millis(500));
        let stored = StoredValue::decode(&key, &host.get("schedule-0").unwrap()).unwrap();
        assert_eq!(stored, schedule("off"));
    }

    #[test]
    fn test_superseded_entry_is_not_written() {
        let f = fixture();
        let key = StorageKey::staff(4);
        f.writer.queue_write(key.clone(), staff_at(100)).unwrap();
        assert_eq!(f.writer.write_now(key.clone(), staff_at(50)).unwrap(), None);
        assert_eq!(f.writer.pending_count(), 0);

        let report = f.writer.flush_all().unwrap();
        assert_eq!(report.written, 0);
        let stored = StoredValue::decode(&key, &f.store.get("staff-4").unwrap()).unwrap();
        assert_eq!(stored, staff_at(50));
    }

    #[test]
    fn test_read_through_does_not_overwrite_newer_save() {
        let f = fixture();
        let key = StorageKey::schedule(5);
        f.store
            .set("schedule-5", &schedule("early").encode().unwrap())
            .unwrap();

        let seen = f.writer.revision(&key).unwrap();
        f.writer.queue_write(key.clone(), schedule("late")).unwrap();
        f.writer.fill_cache(&key, schedule("early"), seen).unwrap();

        assert_eq!(f.cache.lock().unwrap().get(&key), Some(schedule("late")));
    }

    #[test]
    fn test_failed_entries_are_reported_and_not_requeued() {
        let store = Arc::new(MemoryStore::with_quota(16));
        let clock: Arc<dyn shiftstore_core::Clock> = Arc::new(ManualClock::new());
        let adapter = StoreAdapter::new(store.clone());
        let cache = Arc::new(Mutex::new(MemoryCache::with_config(
            CacheConfig::default(),
            Arc::clone(&clock),
        )));
        let quota = Arc::new(QuotaMonitor::new(
            adapter.clone(),
            Arc::clone(&cache),
            QuotaConfig::default(),
            clock,
        ));
        let writer = BatchWriter::new(
            adapter,
            quota,
            cache,
            Arc::new(ManualScheduler::new()),
            BatchConfig::default(),
        );

        writer
            .queue_write(StorageKey::schedule(0), schedule("early"))
            .unwrap();
        let report = writer.flush_all().unwrap();
        assert_eq!(report.failed_keys(), vec![&StorageKey::schedule(0)]);
        assert!(report.failed[0].1.is_quota_exceeded());
        assert_eq!(writer.pending_count(), 0);
        assert!(store.is_empty());
        // Forced flushes hand failures back directly.
        assert_eq!(writer.failure_count(), 0);
    }

    #[test]
    fn test_debounced_flush_failures_are_kept() {
        let store = Arc::new(MemoryStore::with_quota(16));
        let clock: Arc<dyn shiftstore_core::Clock> = Arc::new(ManualClock::new());
        let adapter = StoreAdapter::new(store.clone());
        let cache = Arc::new(Mutex::new(MemoryCache::with_config(
            CacheConfig::default(),
            Arc::clone(&clock),
        )));
        let quota = Arc::new(QuotaMonitor::new(
            adapter.clone(),
            Arc::clone(&cache),
            QuotaConfig::default(),
            clock,
        ));
        let scheduler = ManualScheduler::new();
        let writer = BatchWriter::new(
            adapter,
            quota,
            cache,
            Arc::new(scheduler.clone()),
            BatchConfig::default(),
        );

        writer
            .queue_write(StorageKey::schedule(0), schedule("early"))
            .unwrap();
        scheduler.advance(Duration::from_millis(500));

        assert_eq!(writer.failure_count(), 1);
        let failures = writer.take_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, StorageKey::schedule(0));
        assert!(failures[0].1.is_quota_exceeded());
        assert!(writer.take_failures().is_empty());
    }

    #[test]
    fn test_poisoned_write_lock_reports_every_entry() {
        let f = fixture();
        f.writer.queue_write(StorageKey::schedule(0), schedule("early")).unwrap();
        f.writer.queue_write(StorageKey::schedule(1), schedule("late")).unwrap();

        let inner = Arc::clone(&f.writer.inner);
        let _ = std::thread::spawn(move || {
            let _writing = inner.write_lock.lock().unwrap();
            panic!("writer died mid-write");
        })
        .join();

        let report = f.writer.flush_all().unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(
            report.failed_keys(),
            vec![&StorageKey::schedule(0), &StorageKey::schedule(1)]
        );
        assert!(matches!(report.failed[0].1, Error::LockPoisoned));
        assert_eq!(f.writer.pending_count(), 0);
    }
}
