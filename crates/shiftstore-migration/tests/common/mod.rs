// Common test utilities for migration tests

use shiftstore_core::ManualClock;
use shiftstore_storage::{KeyValueStore, ManualScheduler, MemoryStore, PeriodStore, StoreConfig};
use std::sync::Arc;

/// A host store seeded with raw key/value pairs and a store opened over it
pub struct MigrationFixture {
    pub host: Arc<MemoryStore>,
    pub store: PeriodStore,
}

impl MigrationFixture {
    pub fn seeded(entries: &[(&str, &str)]) -> Self {
        let host = Arc::new(MemoryStore::new());
        for (key, value) in entries {
            host.set(key, value.as_bytes()).expect("Failed to seed host store");
        }

        let store = PeriodStore::open_with_runtime(
            host.clone(),
            StoreConfig::default(),
            Arc::new(ManualScheduler::new()),
            Arc::new(ManualClock::new()),
        )
        .expect("Failed to open store");

        Self { host, store }
    }

    #[allow(dead_code)]
    pub fn has_key(&self, key: &str) -> bool {
        self.host.get(key).is_some()
    }
}
