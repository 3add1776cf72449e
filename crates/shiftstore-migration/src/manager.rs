//! Migration driver
//!
//! Converts the legacy blobs into period keys through the regular
//! [`PeriodStore`] save path, verifies the result against the legacy data
//! and only then removes the legacy keys.

use crate::legacy::{into_stored, parse_schedule_periods, parse_staff_periods, LegacyPeriods};
use crate::{MigrationReport, MigrationState, VerificationError, VerificationReport};
use shiftstore_core::keys::HISTORICAL_KEYS;
use shiftstore_core::{EntityKind, Error, Result, StorageKey, StoredValue};
use shiftstore_storage::PeriodStore;
use tracing::{debug, error, info, warn};

/// Moves legacy single-blob data into the period-keyed layout
pub struct MigrationManager<'a> {
    store: &'a PeriodStore,
    state: MigrationState,
}

impl<'a> MigrationManager<'a> {
    /// Creates a manager working on `store`
    pub fn new(store: &'a PeriodStore) -> Self {
        Self {
            store,
            state: MigrationState::Uninitialized,
        }
    }

    /// Where the migration currently stands
    pub fn state(&self) -> MigrationState {
        self.state
    }

    /// Returns `true` if either legacy blob is present
    pub fn has_legacy_data(&self) -> bool {
        EntityKind::ALL
            .iter()
            .any(|kind| self.store.durable().contains(&StorageKey::legacy(*kind)))
    }

    /// Legacy periods of `kind` as stored values; empty periods are left out
    fn legacy_values(&self, kind: EntityKind) -> LegacyPeriods<StoredValue> {
        let key = StorageKey::legacy(kind);
        let Some(bytes) = self.store.durable().get_raw(&key) else {
            return LegacyPeriods::default();
        };
        let mut parsed = match kind {
            EntityKind::Schedule => into_stored(parse_schedule_periods(key.as_str(), &bytes)),
            EntityKind::Staff => into_stored(parse_staff_periods(key.as_str(), &bytes)),
        };
        parsed.periods.retain(|_, value| !value.is_empty());
        parsed
    }

    /// Writes every non-empty legacy period to its period key and flushes.
    ///
    /// Periods that already hold data, durable or queued, are left alone,
    /// so running the migration again never overwrites edits made since.
    pub fn migrate(&mut self) -> Result<MigrationReport> {
        self.state = MigrationState::Migrating;
        info!("migrating legacy data to period keys");

        let mut migrated = Vec::new();
        for kind in EntityKind::ALL {
            for (period, value) in self.legacy_values(kind).periods {
                let key = StorageKey::period(kind, period);
                if self.store.get(&key)?.is_some() {
                    debug!(key = %key, "period already has data");
                    continue;
                }
                self.store.save(&key, value)?;
                migrated.push(period);
            }
        }
        migrated.sort_unstable();
        migrated.dedup();

        let current_period = match self.store.current_period()? {
            Some(current) => Some(current),
            None => migrated.last().copied(),
        };
        if let Some(current) = current_period {
            self.store.set_current_period(current)?;
        }

        let flush = self.store.flush()?;
        if !flush.is_clean() {
            error!(failed = flush.failed.len(), "migration flush left keys unwritten");
        }

        info!(periods = migrated.len(), ?current_period, "legacy data migrated");
        Ok(MigrationReport {
            migrated_periods: migrated,
            current_period,
            flush_failures: flush.failed.len(),
        })
    }

    /// Compares record counts between legacy and migrated data.
    ///
    /// Legacy periods or blobs that could not be decoded count as lost.
    /// Mismatches are reported, never repaired.
    pub fn verify(&mut self) -> VerificationReport {
        let mut errors = Vec::new();

        for kind in EntityKind::ALL {
            let legacy = self.legacy_values(kind);
            if let Some(reason) = legacy.blob_error {
                errors.push(VerificationError::UnreadableBlob { kind, reason });
            }
            for rejected in legacy.rejected {
                errors.push(VerificationError::UnreadablePeriod {
                    kind,
                    index: rejected.index,
                    legacy_records: rejected.raw_records,
                    reason: rejected.reason,
                });
            }

            for (period, value) in legacy.periods {
                let key = StorageKey::period(kind, period);
                let migrated_records = self
                    .store
                    .durable()
                    .read(&key)
                    .map_or(0, |v| v.record_count());
                if migrated_records < value.record_count() {
                    errors.push(VerificationError::MissingRecords {
                        kind,
                        period,
                        legacy_records: value.record_count(),
                        migrated_records,
                    });
                }
            }
        }

        let success = errors.is_empty();
        self.state = if success {
            MigrationState::Verified
        } else {
            for e in &errors {
                warn!(%e, "migration verification failed");
            }
            MigrationState::VerificationFailed
        };

        VerificationReport { success, errors }
    }

    /// Removes the legacy blobs and historical keys.
    ///
    /// Refuses to run unless `verification` succeeded. Returns the number of
    /// keys removed.
    pub fn cleanup_legacy(&mut self, verification: &VerificationReport) -> Result<usize> {
        if !verification.success {
            return Err(Error::InvalidOperation(format!(
                "legacy cleanup refused: {} periods failed verification",
                verification.errors.len()
            )));
        }

        let doomed = EntityKind::ALL
            .iter()
            .map(|kind| StorageKey::legacy(*kind))
            .chain(HISTORICAL_KEYS.iter().map(|k| StorageKey::from_raw(*k)));

        let mut removed = 0;
        for key in doomed {
            if self.store.durable().contains(&key) {
                self.store.delete(&key)?;
                removed += 1;
            }
        }

        self.state = MigrationState::LegacyCleaned;
        info!(removed, "legacy keys removed");
        Ok(removed)
    }

    /// Removes period-prefixed keys built from a missing period index
    pub fn cleanup_malformed_keys(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for raw in self.store.durable().keys() {
            let key = StorageKey::from_raw(raw);
            if key.is_malformed() {
                self.store.delete(&key)?;
                removed.push(key.to_string());
            }
        }
        if !removed.is_empty() {
            warn!(count = removed.len(), "removed malformed keys");
        }
        Ok(removed)
    }

    /// Runs the whole migration: malformed key cleanup, migration,
    /// verification and, only if verification succeeds, legacy cleanup.
    pub fn run(&mut self) -> Result<MigrationState> {
        self.cleanup_malformed_keys()?;

        if !self.has_legacy_data() {
            self.state = MigrationState::NotNeeded;
            return Ok(self.state);
        }

        self.migrate()?;
        let verification = self.verify();
        if verification.success {
            self.cleanup_legacy(&verification)?;
        }
        Ok(self.state)
    }
}
