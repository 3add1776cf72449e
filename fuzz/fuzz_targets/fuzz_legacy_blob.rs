#![no_main]

use libfuzzer_sys::fuzz_target;
use shiftstore_migration::legacy::{parse_schedule_periods, parse_staff_periods};

fuzz_target!(|data: &[u8]| {
    // Malformed blobs are reported, never a panic
    let schedules = parse_schedule_periods("schedules-by-period", data);
    let staff = parse_staff_periods("staff-by-period", data);
    if schedules.blob_error.is_some() {
        assert!(schedules.periods.is_empty());
    }
    if staff.blob_error.is_some() {
        assert!(staff.periods.is_empty());
    }
});
