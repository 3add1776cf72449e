// End-to-end tests through the public shiftstore API

use shiftstore::{
    EntityKind, KeyValueStore, MemoryStore, MigrationState, ScheduleValue, StaffRecord,
    StaffValue, StoreConfig,
};
use std::sync::Arc;
use tempfile::TempDir;

fn no_timers() -> StoreConfig {
    StoreConfig::default().with_cleanup_interval(None)
}

#[test]
fn test_in_memory_round_trip() {
    let store = shiftstore::in_memory().unwrap();
    let schedule = ScheduleValue::new().with("s1", "2025-01-01", "early");

    store.save_schedule(0, schedule.clone()).unwrap();
    store.set_current_period(0).unwrap();

    assert_eq!(store.get_schedule(0).unwrap(), Some(schedule));
    assert_eq!(store.current_period().unwrap(), Some(0));
    store.shutdown().unwrap();
}

#[test]
fn test_open_migrates_legacy_host() {
    let host = Arc::new(MemoryStore::new());
    host.set(
        "schedules-by-period",
        br#"{"0":{"s1":{"2025-01-01":"early"}},"2":{"s2":{"2025-03-01":"off"}}}"#,
    )
    .unwrap();
    host.set("staff-by-period", br#"[[{"id":"s1","name":"Ana"}]]"#)
        .unwrap();
    host.set("staff-undefined", b"[]").unwrap();

    let store = shiftstore::open_store(host.clone(), no_timers()).unwrap();

    assert_eq!(store.periods(EntityKind::Schedule), vec![0, 2]);
    assert_eq!(store.periods(EntityKind::Staff), vec![0]);
    assert_eq!(store.current_period().unwrap(), Some(2));
    assert!(host.get("schedules-by-period").is_none());
    assert!(host.get("staff-by-period").is_none());
    assert!(host.get("staff-undefined").is_none());

    let mut migration = shiftstore::MigrationManager::new(&store);
    assert_eq!(migration.run().unwrap(), MigrationState::NotNeeded);
}

#[test]
fn test_file_store_reopen() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let staff = StaffValue::new(vec![StaffRecord::new("s1", "Ana")]);

    {
        let store = shiftstore::open_with_config(dir.path(), no_timers()).unwrap();
        store
            .save_schedule(1, ScheduleValue::new().with("s1", "2025-02-01", "late"))
            .unwrap();
        store.save_staff(1, staff.clone()).unwrap();
        // Dropped without shutdown: the pending schedule is flushed on drop.
    }

    let store = shiftstore::open(dir.path()).unwrap();
    assert_eq!(store.get_staff(1).unwrap(), Some(staff));
    assert_eq!(
        store
            .get_schedule(1)
            .unwrap()
            .and_then(|s| s.shift("s1", "2025-02-01").map(str::to_string)),
        Some("late".to_string())
    );
}

#[test]
fn test_version_constant() {
    assert!(!shiftstore::VERSION.is_empty());
}
