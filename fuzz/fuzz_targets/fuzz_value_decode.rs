#![no_main]

use libfuzzer_sys::fuzz_target;
use shiftstore_core::{StorageKey, StoredValue};

fuzz_target!(|data: &[u8]| {
    for key in [
        StorageKey::schedule(0),
        StorageKey::staff(0),
        StorageKey::current_period(),
    ] {
        // Anything that decodes must encode and decode again
        if let Ok(value) = StoredValue::decode(&key, data) {
            let _ = value.record_count();
            let bytes = value.encode().expect("decoded value encodes");
            assert!(StoredValue::decode(&key, &bytes).is_ok());
        }
    }
});
