// Common test utilities for storage integration tests

use shiftstore_core::ManualClock;
use shiftstore_storage::{
    KeyValueStore, ManualScheduler, MemoryStore, PeriodStore, StoreConfig, StoreError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type WriteHook = Box<dyn FnOnce() + Send>;

/// Host store wrapper that counts writes per key and can refuse writes
pub struct RecordingStore {
    inner: MemoryStore,
    writes: Mutex<HashMap<String, usize>>,
    refuse_next: AtomicUsize,
    hooks: Mutex<HashMap<String, WriteHook>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::wrap(MemoryStore::new())
    }

    pub fn wrap(inner: MemoryStore) -> Self {
        Self {
            inner,
            writes: Mutex::new(HashMap::new()),
            refuse_next: AtomicUsize::new(0),
            hooks: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `hook` once, right after the next successful write to `key`
    #[allow(dead_code)]
    pub fn after_next_write(&self, key: &str, hook: impl FnOnce() + Send + 'static) {
        self.hooks
            .lock()
            .unwrap()
            .insert(key.to_string(), Box::new(hook));
    }

    /// The next `n` writes fail with `QuotaExceeded`
    pub fn refuse_next_writes(&self, n: usize) {
        self.refuse_next.store(n, Ordering::SeqCst);
    }

    /// Write calls received for `key`, refused ones included
    pub fn writes_to(&self, key: &str) -> usize {
        self.writes.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

impl KeyValueStore for RecordingStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        *self.writes.lock().unwrap().entry(key.to_string()).or_default() += 1;
        let refused = self
            .refuse_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(StoreError::QuotaExceeded);
        }
        self.inner.set(key, value)?;

        let hook = self.hooks.lock().unwrap().remove(key);
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }
}

/// A store on a manual timeline
#[allow(dead_code)]
pub struct StoreFixture {
    pub host: Arc<RecordingStore>,
    pub store: PeriodStore,
    pub scheduler: ManualScheduler,
    pub clock: ManualClock,
}

impl StoreFixture {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_host(Arc::new(RecordingStore::new()), config)
    }

    pub fn with_host(host: Arc<RecordingStore>, config: StoreConfig) -> Self {
        let scheduler = ManualScheduler::new();
        let clock = ManualClock::new();
        let store = PeriodStore::open_with_runtime(
            host.clone(),
            config,
            Arc::new(scheduler.clone()),
            Arc::new(clock.clone()),
        )
        .expect("Failed to open store");

        Self {
            host,
            store,
            scheduler,
            clock,
        }
    }
}

impl Default for StoreFixture {
    fn default() -> Self {
        Self::new()
    }
}
