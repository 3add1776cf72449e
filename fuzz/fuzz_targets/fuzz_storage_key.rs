#![no_main]

use libfuzzer_sys::fuzz_target;
use shiftstore_core::StorageKey;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    // Parsing must never panic, and a parsed key must print back unchanged
    if let Ok((kind, index)) = StorageKey::parse_period(raw) {
        assert_eq!(StorageKey::period(kind, index).as_str(), raw);
    }

    let key = StorageKey::from_raw(raw);
    let _ = key.kind();
    let _ = key.period_index();
    let _ = key.is_malformed();
    let _ = key.is_legacy();
});
