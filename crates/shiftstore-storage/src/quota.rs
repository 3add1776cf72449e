//! QuotaMonitor - capacity probing and recovery from storage exhaustion
//!
//! Every write that reaches the host store goes through
//! [`QuotaMonitor::write`]. A quota failure triggers exactly one cleanup and
//! one retry; a second failure is returned to the caller.

use crate::cache::MemoryCache;
use crate::kv::StoreAdapter;
use shiftstore_core::{Clock, Error, Result, StorageKey, StoredValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Prefix of throwaway keys written by capacity probes
pub const PROBE_KEY_PREFIX: &str = "__quota-probe-";

/// Default time a probe result is trusted (30 seconds)
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

/// Default probe payload size (1 KiB)
const DEFAULT_PROBE_BYTES: usize = 1024;

/// Quota monitor configuration
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// How long a probe result is reused before probing again
    pub cooldown: Duration,
    /// Size of the throwaway probe write
    pub probe_bytes: usize,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            probe_bytes: DEFAULT_PROBE_BYTES,
        }
    }
}

impl QuotaConfig {
    /// Set the probe cooldown
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the probe payload size
    pub fn with_probe_bytes(mut self, probe_bytes: usize) -> Self {
        self.probe_bytes = probe_bytes;
        self
    }
}

/// Result of a capacity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    /// A probe-sized write currently fits
    pub available: bool,
    /// The store reported quota exhaustion
    pub exceeded: bool,
    /// Estimated bytes used by all keys and values
    pub usage_bytes: usize,
}

/// What a cleanup pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Expired cache entries dropped
    pub expired_entries: usize,
    /// Stray probe keys removed from the store
    pub probe_keys: usize,
}

#[derive(Debug, Default)]
struct ProbeState {
    available: bool,
    exceeded: bool,
    checked_at: Option<Instant>,
}

/// Detects and recovers from host store exhaustion
pub struct QuotaMonitor {
    store: StoreAdapter,
    cache: Arc<Mutex<MemoryCache>>,
    config: QuotaConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<ProbeState>,
    probe_seq: AtomicU64,
}

impl QuotaMonitor {
    /// Creates a monitor over `store` that cleans up `cache`
    pub fn new(
        store: StoreAdapter,
        cache: Arc<Mutex<MemoryCache>>,
        config: QuotaConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cache,
            config,
            clock,
            state: Mutex::new(ProbeState::default()),
            probe_seq: AtomicU64::new(0),
        }
    }

    /// Checks whether the store can take more data.
    ///
    /// A throwaway write+remove probe runs at most once per cooldown window;
    /// inside the window the previous verdict is reused. The usage estimate
    /// is always recomputed.
    pub fn check_quota(&self) -> Result<QuotaStatus> {
        let usage_bytes = self.store.usage_bytes();
        let now = self.clock.now();

        {
            let state = self.state.lock().map_err(|_| Error::LockPoisoned)?;
            if let Some(at) = state.checked_at {
                if now.saturating_duration_since(at) < self.config.cooldown {
                    return Ok(QuotaStatus {
                        available: state.available,
                        exceeded: state.exceeded,
                        usage_bytes,
                    });
                }
            }
        }

        let (available, exceeded) = self.probe();
        let mut state = self.state.lock().map_err(|_| Error::LockPoisoned)?;
        state.available = available;
        state.exceeded = exceeded;
        state.checked_at = Some(now);

        Ok(QuotaStatus {
            available,
            exceeded,
            usage_bytes,
        })
    }

    fn probe(&self) -> (bool, bool) {
        let seq = self.probe_seq.fetch_add(1, Ordering::Relaxed);
        let key = StorageKey::from_raw(format!("{}{}", PROBE_KEY_PREFIX, seq));
        let payload = vec![b'x'; self.config.probe_bytes];

        match self.store.set_raw(&key, &payload) {
            Ok(()) => {
                if let Err(e) = self.store.remove(&key) {
                    // Left for the next cleanup pass.
                    warn!(key = %key, error = %e, "failed to remove quota probe");
                }
                (true, false)
            }
            Err(e) if e.is_quota_exceeded() => {
                warn!("quota probe refused, store is full");
                (false, true)
            }
            Err(e) => {
                warn!(error = %e, "quota probe failed");
                (false, false)
            }
        }
    }

    /// Removes expired cache entries and stray probe keys
    pub fn cleanup(&self) -> Result<CleanupReport> {
        let expired_entries = {
            let mut cache = self.cache.lock().map_err(|_| Error::LockPoisoned)?;
            cache.remove_expired()
        };

        let mut probe_keys = 0;
        for raw in self.store.keys() {
            if !raw.starts_with(PROBE_KEY_PREFIX) {
                continue;
            }
            match self.store.remove(&StorageKey::from_raw(raw)) {
                Ok(()) => probe_keys += 1,
                Err(e) => warn!(error = %e, "failed to remove stray quota probe"),
            }
        }

        let report = CleanupReport {
            expired_entries,
            probe_keys,
        };
        debug!(
            expired_entries = report.expired_entries,
            probe_keys = report.probe_keys,
            "cleanup pass"
        );
        Ok(report)
    }

    /// Writes `value` under `key`, with one cleanup and retry on quota failure.
    ///
    /// Must not be called while holding the cache lock.
    pub fn write(&self, key: &StorageKey, value: &StoredValue) -> Result<()> {
        let bytes = value.encode()?;

        match self.store.set_raw(key, &bytes) {
            Ok(()) => {
                self.record_success()?;
                Ok(())
            }
            Err(e) if e.is_quota_exceeded() => {
                warn!(key = %key, "quota exceeded, cleaning up before retry");
                self.record_exceeded()?;
                self.cleanup()?;

                match self.store.set_raw(key, &bytes) {
                    Ok(()) => {
                        info!(key = %key, "write succeeded after cleanup");
                        self.record_success()?;
                        Ok(())
                    }
                    Err(e) => {
                        error!(key = %key, error = %e, "write failed after cleanup and retry");
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Returns `true` while the last known verdict is "store full"
    pub fn is_exceeded(&self) -> bool {
        self.state.lock().map(|s| s.exceeded).unwrap_or(false)
    }

    fn record_exceeded(&self) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| Error::LockPoisoned)?;
        state.available = false;
        state.exceeded = true;
        state.checked_at = Some(self.clock.now());
        Ok(())
    }

    fn record_success(&self) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| Error::LockPoisoned)?;
        if state.exceeded {
            state.exceeded = false;
            state.available = true;
        }
        Ok(())
    }
}
