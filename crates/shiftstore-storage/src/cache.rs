//! MemoryCache - TTL-bounded in-process read cache
//!
//! The cache holds both values confirmed in the host store and values still
//! waiting in the write queue, so it is the authoritative current value for
//! every key it contains. Entries expire `ttl` after they were stored and are
//! dropped lazily on access or by [`MemoryCache::remove_expired`].
//!
//! Capacity is enforced approximately: only when an insert pushes the cache
//! over `max_entries` are the least recently accessed 25% evicted in one go.

use shiftstore_core::{Clock, StorageKey, StoredValue, SystemClock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default entry lifetime (5 minutes)
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default maximum number of entries
const DEFAULT_MAX_ENTRIES: usize = 50;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry stays valid after it was stored
    pub ttl: Duration,
    /// Entry count above which eviction runs
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CacheConfig {
    /// Set the entry lifetime
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the entry cap
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }
}

/// A cached value with its bookkeeping timestamps
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached value
    pub data: StoredValue,
    /// When the value was stored
    pub stored_at: Instant,
    /// When the value was last read or written
    pub last_accessed_at: Instant,
    /// Access order, breaks ties between equal instants
    access_seq: u64,
}

/// Snapshot of cache occupancy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Number of entries, expired ones included
    pub entries: usize,
    /// Age of the oldest entry
    pub oldest_age: Option<Duration>,
    /// Age of the newest entry
    pub newest_age: Option<Duration>,
}

/// TTL-bounded cache keyed by [`StorageKey`]
pub struct MemoryCache {
    entries: HashMap<StorageKey, CacheEntry>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    access_counter: u64,
}

impl MemoryCache {
    /// Creates a cache with the default configuration and system clock
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default(), Arc::new(SystemClock))
    }

    /// Creates a cache with explicit configuration and clock
    pub fn with_config(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            config,
            clock,
            access_counter: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    /// Returns the value under `key` unless it is missing or expired.
    ///
    /// An expired entry is removed; a hit refreshes its access time.
    pub fn get(&mut self, key: &StorageKey) -> Option<StoredValue> {
        let now = self.clock.now();
        let ttl = self.config.ttl;

        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) => now.saturating_duration_since(entry.stored_at) > ttl,
        };
        if expired {
            debug!(key = %key, "cache entry expired");
            self.entries.remove(key);
            return None;
        }

        let seq = self.next_seq();
        let entry = self.entries.get_mut(key)?;
        entry.last_accessed_at = now;
        entry.access_seq = seq;
        Some(entry.data.clone())
    }

    /// Inserts or replaces the value under `key` with a fresh timestamp
    pub fn set(&mut self, key: StorageKey, value: StoredValue) {
        let now = self.clock.now();
        let seq = self.next_seq();
        self.entries.insert(
            key,
            CacheEntry {
                data: value,
                stored_at: now,
                last_accessed_at: now,
                access_seq: seq,
            },
        );

        if self.entries.len() > self.config.max_entries {
            self.evict_oldest();
        }
    }

    /// Removes `key`, returning `true` if it was present
    pub fn delete(&mut self, key: &StorageKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Removes the least recently accessed quarter of the entries (at least one)
    pub fn evict_oldest(&mut self) -> usize {
        let mut by_access: Vec<(Instant, u64, StorageKey)> = self
            .entries
            .iter()
            .map(|(k, e)| (e.last_accessed_at, e.access_seq, k.clone()))
            .collect();
        by_access.sort_unstable();

        let count = (by_access.len() / 4).max(1).min(by_access.len());
        for (_, _, key) in by_access.into_iter().take(count) {
            self.entries.remove(&key);
        }

        debug!(evicted = count, remaining = self.entries.len(), "cache eviction");
        count
    }

    /// Drops every expired entry, returning how many were removed
    pub fn remove_expired(&mut self) -> usize {
        let now = self.clock.now();
        let ttl = self.config.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.stored_at) <= ttl);
        before - self.entries.len()
    }

    /// Returns `true` if `key` is cached, expired or not, without touching it
    pub fn contains(&self, key: &StorageKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The configured capacity
    pub fn max_entries(&self) -> usize {
        self.config.max_entries
    }

    /// Occupancy and age bounds
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let ages = self
            .entries
            .values()
            .map(|e| now.saturating_duration_since(e.stored_at));
        CacheStats {
            entries: self.entries.len(),
            oldest_age: ages.clone().max(),
            newest_age: ages.min(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftstore_core::{ManualClock, ScheduleValue};

    fn value(shift: &str) -> StoredValue {
        ScheduleValue::new().with("A", "2025-01-01", shift).into()
    }

    fn cache(max_entries: usize) -> (MemoryCache, ManualClock) {
        let clock = ManualClock::new();
        let config = CacheConfig::default().with_max_entries(max_entries);
        (MemoryCache::with_config(config, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_cache_set_get() {
        let (mut cache, _) = cache(50);
        cache.set(StorageKey::schedule(0), value("early"));
        assert_eq!(cache.get(&StorageKey::schedule(0)), Some(value("early")));
        assert_eq!(cache.get(&StorageKey::schedule(1)), None);

        cache.set(StorageKey::schedule(0), value("off"));
        assert_eq!(cache.get(&StorageKey::schedule(0)), Some(value("off")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_expiry_on_access() {
        let (mut cache, clock) = cache(50);
        let key = StorageKey::schedule(0);
        cache.set(key.clone(), value("early"));

        clock.advance(DEFAULT_TTL);
        assert!(cache.get(&key).is_some(), "exactly ttl old is still fresh");

        clock.advance(Duration::from_millis(1));
        assert!(cache.get(&key).is_none());
        assert!(!cache.contains(&key));
    }

    #[test]
    fn test_hit_does_not_extend_ttl() {
        let (mut cache, clock) = cache(50);
        let key = StorageKey::schedule(0);
        cache.set(key.clone(), value("early"));

        clock.advance(Duration::from_secs(200));
        assert!(cache.get(&key).is_some());
        clock.advance(Duration::from_secs(101));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_eviction_bound_and_victims() {
        let (mut cache, _) = cache(8);
        for i in 0..8 {
            cache.set(StorageKey::schedule(i), value("early"));
        }
        // Touch the two oldest so they survive.
        cache.get(&StorageKey::schedule(0));
        cache.get(&StorageKey::schedule(1));

        cache.set(StorageKey::schedule(8), value("early"));
        assert!(cache.len() <= 8);
        // 9 entries, a quarter rounds down to two victims: periods 2 and 3.
        assert_eq!(cache.len(), 7);
        assert!(!cache.contains(&StorageKey::schedule(2)));
        assert!(!cache.contains(&StorageKey::schedule(3)));
        assert!(cache.contains(&StorageKey::schedule(0)));
        assert!(cache.contains(&StorageKey::schedule(8)));
    }

    #[test]
    fn test_eviction_removes_at_least_one() {
        let (mut cache, _) = cache(1);
        cache.set(StorageKey::schedule(0), value("a"));
        cache.set(StorageKey::schedule(1), value("b"));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&StorageKey::schedule(1)));
    }

    #[test]
    fn test_remove_expired_and_stats() {
        let (mut cache, clock) = cache(50);
        cache.set(StorageKey::schedule(0), value("a"));
        clock.advance(Duration::from_secs(250));
        cache.set(StorageKey::schedule(1), value("b"));
        clock.advance(Duration::from_secs(100));

        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.oldest_age, Some(Duration::from_secs(350)));
        assert_eq!(stats.newest_age, Some(Duration::from_secs(100)));

        assert_eq!(cache.remove_expired(), 1);
        assert!(cache.contains(&StorageKey::schedule(1)));
    }

    #[test]
    fn test_delete_and_clear() {
        let (mut cache, _) = cache(50);
        cache.set(StorageKey::schedule(0), value("a"));
        cache.set(StorageKey::staff(0), value("b"));
        assert!(cache.delete(&StorageKey::schedule(0)));
        assert!(!cache.delete(&StorageKey::schedule(0)));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
