//! Walks through saving, reading and migrating period data.
//!
//! Run with: cargo run -p shiftstore --example period_demo

use shiftstore::logging::LogConfig;
use shiftstore::{EntityKind, KeyValueStore, MemoryStore, ScheduleValue, StaffRecord, StaffValue};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Debug level shows queueing, flushes and migration progress
    let _guard = LogConfig::debug().init();

    println!("=== Shiftstore Period Demo ===\n");

    // A host that still holds data in the old single-blob layout
    let host = Arc::new(MemoryStore::new());
    host.set(
        "schedules-by-period",
        br#"{"0":{"s1":{"2025-01-06":"early"}},"1":{"s1":{"2025-02-03":"late"}}}"#,
    )?;
    host.set("staff-by-period", br#"{"0":[{"id":"s1","name":"Ana"}]}"#)?;

    println!("1. Opening store (migrates legacy data)...");
    let store = shiftstore::open_store(host.clone(), Default::default())?;
    println!("   schedule periods: {:?}", store.periods(EntityKind::Schedule));
    println!("   current period:   {:?}", store.current_period()?);

    println!("\n2. Editing a schedule (debounced)...");
    for marker in ["early", "late", "off"] {
        let schedule = ScheduleValue::new().with("s1", "2025-02-03", marker);
        store.save_schedule(1, schedule)?;
    }
    println!("   pending writes: {}", store.pending_count());

    println!("\n3. Saving staff (written immediately)...");
    let staff = StaffValue::new(vec![
        StaffRecord::new("s1", "Ana"),
        StaffRecord::new("s2", "Ben"),
    ]);
    println!("   outcome: {:?}", store.save_staff(1, staff)?);

    println!("\n4. Shutting down...");
    let report = store.shutdown()?;
    println!("   flushed {} keys, {} failed", report.written, report.failed.len());

    let stats = store.usage_stats()?;
    println!("   host bytes: {}", stats.store_bytes);

    println!("\n=== Demo Complete ===");
    Ok(())
}
