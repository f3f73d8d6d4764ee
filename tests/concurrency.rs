// ==============================================
// CONCURRENCY TESTS (integration)
// ==============================================
//
// On-demand cache creation and get-or-compute under contention. These need
// real threads released together by a barrier.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use named_caches::{CacheManager, CacheSettings, Components};

const THREADS: usize = 16;

fn lazy_manager() -> Arc<CacheManager<u64>> {
    let settings = CacheSettings::default().can_create_default_caches(true);
    Arc::new(CacheManager::new(settings, Components::new()).unwrap())
}

// ==============================================
// At-most-one construction per name
// ==============================================

#[test]
fn concurrent_lookups_of_new_name_share_one_instance() {
    common::init_tracing();

    for _ in 0..50 {
        let manager = lazy_manager();
        let built_before = manager.created_count();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    manager.get_cache("x").unwrap().unwrap()
                })
            })
            .collect();

        let caches: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for cache in &caches[1..] {
            assert!(
                Arc::ptr_eq(&caches[0], cache),
                "concurrent lookups of 'x' returned distinct instances"
            );
        }
        assert_eq!(manager.len(), 2, "expected only 'default' and 'x'");
        assert_eq!(
            manager.created_count(),
            built_before + 1,
            "'x' was built more than once"
        );
    }
}

#[test]
fn concurrent_lookups_of_distinct_names_all_register() {
    let manager = lazy_manager();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.get_cache(&format!("cache-{i}")).unwrap().unwrap()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(manager.cache_names().len(), THREADS + 1);
}

// ==============================================
// Single computation per missing key
// ==============================================

#[test]
fn concurrent_compute_runs_once() {
    common::init_tracing();

    let manager = lazy_manager();
    let cache = manager.get_cache("computed").unwrap().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_compute(&1, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    Some("expensive".to_string())
                })
            })
        })
        .collect();

    let values: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().expect("computed value"))
        .collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for value in &values {
        assert!(Arc::ptr_eq(&values[0], value), "callers saw different values");
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("expensive"));
    }
}

#[test]
fn concurrent_failed_compute_is_shared() {
    let manager = lazy_manager();
    let cache = manager.get_cache("failing").unwrap().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.try_get_or_compute(&1, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    Err::<Option<u8>, _>("unavailable")
                })
            })
        })
        .collect();

    for handle in handles {
        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(*err, "unavailable");
    }
    // a failure is not cached, so late arrivals may have retried
    assert!(calls.load(Ordering::SeqCst) >= 1);
    assert!(cache.get(&1).is_none());
}
