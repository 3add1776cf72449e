#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shiftstore_core::{ManualClock, ScheduleValue, StaffRecord, StaffValue, StorageKey};
use shiftstore_storage::{ManualScheduler, MemoryStore, PeriodStore, StoreConfig};
use std::sync::Arc;
use std::time::Duration;

#[derive(Arbitrary, Debug)]
enum StoreOp {
    SaveSchedule { period: u8, staff: u8, marker: u8 },
    SaveStaff { period: u8, count: u8 },
    Get { period: u8, staff: bool },
    Delete { period: u8 },
    Advance { millis: u16 },
    Flush,
}

fuzz_target!(|ops: Vec<StoreOp>| {
    let scheduler = Arc::new(ManualScheduler::new());
    let clock = Arc::new(ManualClock::new());
    let Ok(store) = PeriodStore::open_with_runtime(
        Arc::new(MemoryStore::with_quota(4096)),
        StoreConfig::default(),
        scheduler.clone(),
        clock.clone(),
    ) else {
        return;
    };

    // Limit operations to prevent timeout
    for op in ops.iter().take(200) {
        match *op {
            StoreOp::SaveSchedule { period, staff, marker } => {
                let schedule = ScheduleValue::new().with(
                    format!("s{staff}"),
                    "2025-01-01",
                    format!("m{marker}"),
                );
                let _ = store.save_schedule(period.into(), schedule);
            }
            StoreOp::SaveStaff { period, count } => {
                let records = (0..count % 16)
                    .map(|i| StaffRecord::new(format!("s{i}"), "x"))
                    .collect();
                let _ = store.save_staff(period.into(), StaffValue::new(records));
            }
            StoreOp::Get { period, staff } => {
                let _ = if staff {
                    store.get(&StorageKey::staff(period.into()))
                } else {
                    store.get(&StorageKey::schedule(period.into()))
                };
            }
            StoreOp::Delete { period } => {
                let _ = store.delete(&StorageKey::schedule(period.into()));
            }
            StoreOp::Advance { millis } => {
                let by = Duration::from_millis(millis.into());
                clock.advance(by);
                scheduler.advance(by);
            }
            StoreOp::Flush => {
                let _ = store.flush();
            }
        }
    }

    let _ = store.shutdown();
});
