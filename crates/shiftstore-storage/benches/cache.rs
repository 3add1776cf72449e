use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shiftstore_core::{ScheduleValue, StorageKey, StoredValue};
use shiftstore_storage::MemoryCache;

fn sample_value() -> StoredValue {
    let mut schedule = ScheduleValue::new();
    for staff in 0..20 {
        for day in 1..=28 {
            schedule.assign(format!("staff-{staff}"), format!("2025-02-{day:02}"), "early");
        }
    }
    schedule.into()
}

fn bench_cache_hit(c: &mut Criterion) {
    let mut cache = MemoryCache::new();
    for i in 0..50 {
        cache.set(StorageKey::schedule(i), sample_value());
    }

    c.bench_function("cache_get_hit", |b| {
        let mut i = 0u32;
        b.iter(|| {
            i = (i + 1) % 50;
            black_box(cache.get(black_box(&StorageKey::schedule(i))))
        })
    });
}

fn bench_cache_set_with_eviction(c: &mut Criterion) {
    let mut cache = MemoryCache::new();
    let value = sample_value();

    c.bench_function("cache_set_over_capacity", |b| {
        let mut i = 0u32;
        b.iter(|| {
            i = i.wrapping_add(1);
            cache.set(StorageKey::schedule(i), black_box(value.clone()));
        })
    });
}

criterion_group!(benches, bench_cache_hit, bench_cache_set_with_eviction);
criterion_main!(benches);
