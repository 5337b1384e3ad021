use cortado::expiry::Expiry;
use cortado::listener::EvictionCause;
use cortado::CacheBuilder;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn make_cache() -> cortado::Cache<String, String> {
    CacheBuilder::new().build()
}

// ---------------------------------------------------------------------------
// Fundamental API correctness
// ---------------------------------------------------------------------------

#[test]
fn get_returns_none_on_miss() {
    let cache = make_cache();
    assert_eq!(cache.get(&"missing".to_string()), None);
}

#[test]
fn insert_and_get() {
    let cache = make_cache();
    cache.insert("hello".to_string(), "world".to_string());
    assert_eq!(
        cache.get(&"hello".to_string()),
        Some(Arc::new("world".to_string()))
    );
}

#[test]
fn update_replaces_value() {
    let cache = make_cache();
    cache.insert("k".to_string(), "v1".to_string());
    cache.insert("k".to_string(), "v2".to_string());
    assert_eq!(
        cache.get(&"k".to_string()),
        Some(Arc::new("v2".to_string()))
    );
    assert_eq!(cache.entry_count(), 1, "update must not create a second entry");
}

#[test]
fn invalidate_removes_entry() {
    let cache = make_cache();
    cache.insert("key".to_string(), "val".to_string());
    cache.invalidate(&"key".to_string());
    assert_eq!(cache.get(&"key".to_string()), None);
}

#[test]
fn invalidate_all_clears_everything() {
    let cache = make_cache();
    for i in 0..100 {
        cache.insert(i.to_string(), i.to_string());
    }
    cache.invalidate_all();
    assert!(cache.is_empty());
    assert_eq!(cache.get(&"7".to_string()), None);
}

#[test]
fn stats_tracks_hits_and_misses() {
    let cache = make_cache();
    cache.insert("k".to_string(), "v".to_string());
    cache.get(&"k".to_string()); // hit
    cache.get(&"k".to_string()); // hit
    cache.get(&"nope".to_string()); // miss

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert!(
        (stats.hit_rate - 2.0 / 3.0).abs() < 1e-9,
        "hit_rate = {}",
        stats.hit_rate
    );
}

#[test]
fn cache_is_clone_and_shared() {
    let c1 = make_cache();
    let c2 = c1.clone();
    c1.insert("shared".to_string(), "yes".to_string());
    assert!(
        c2.get(&"shared".to_string()).is_some(),
        "cloned handle must see the same entries"
    );
}

// ---------------------------------------------------------------------------
// TTL
// ---------------------------------------------------------------------------

#[test]
fn ttl_entry_not_returned_after_expiry() {
    let cache: cortado::Cache<String, String> = CacheBuilder::new()
        .time_to_live(Duration::from_millis(50))
        .build();

    cache.insert("k".to_string(), "v".to_string());
    // Before TTL: should be present.
    assert!(cache.get(&"k".to_string()).is_some(), "entry should be alive");

    std::thread::sleep(Duration::from_millis(100));

    // After TTL: must be absent.
    assert!(
        cache.get(&"k".to_string()).is_none(),
        "entry should have expired"
    );
}

#[test]
fn ttl_entry_replaced_resets_expiry() {
    let cache: cortado::Cache<String, String> = CacheBuilder::new()
        .time_to_live(Duration::from_millis(80))
        .build();

    cache.insert("k".to_string(), "v1".to_string());
    std::thread::sleep(Duration::from_millis(50));
    // Re-insert resets TTL.
    cache.insert("k".to_string(), "v2".to_string());
    std::thread::sleep(Duration::from_millis(50));
    // 50 + 50 = 100 ms total since first insert, but only 50 ms since replace.
    assert!(
        cache.get(&"k".to_string()).is_some(),
        "re-inserted entry should still be alive"
    );
}

#[test]
fn ttl_read_does_not_extend_lifetime() {
    let cache: cortado::Cache<String, String> = CacheBuilder::new()
        .time_to_live(Duration::from_millis(100))
        .build();

    cache.insert("k".to_string(), "v".to_string());
    std::thread::sleep(Duration::from_millis(60));
    assert!(cache.get(&"k".to_string()).is_some(), "still within TTL");
    std::thread::sleep(Duration::from_millis(60));
    // 120 ms since the write; the read at 60 ms must not have helped.
    assert!(
        cache.get(&"k".to_string()).is_none(),
        "TTL counts from the write, not the last read"
    );
}

#[test]
fn expired_entry_counts_as_miss_and_expiration() {
    let cache: cortado::Cache<String, String> = CacheBuilder::new()
        .time_to_live(Duration::from_millis(40))
        .build();

    cache.insert("k".to_string(), "v".to_string());
    std::thread::sleep(Duration::from_millis(80));
    assert!(cache.get(&"k".to_string()).is_none());

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert!(stats.expirations >= 1, "inline expiry must be counted");
}

// ---------------------------------------------------------------------------
// TTI
// ---------------------------------------------------------------------------

#[test]
fn tti_entry_expires_without_access() {
    let cache: cortado::Cache<String, String> = CacheBuilder::new()
        .time_to_idle(Duration::from_millis(60))
        .build();

    cache.insert("k".to_string(), "v".to_string());
    // Let it idle past the TTI without any get.
    std::thread::sleep(Duration::from_millis(100));

    assert!(
        cache.get(&"k".to_string()).is_none(),
        "idle entry should have expired"
    );
}

#[test]
fn tti_access_resets_idle_timer() {
    let cache: cortado::Cache<String, String> = CacheBuilder::new()
        .time_to_idle(Duration::from_millis(80))
        .build();

    cache.insert("k".to_string(), "v".to_string());

    // Keep it alive with periodic reads.
    for _ in 0..3 {
        std::thread::sleep(Duration::from_millis(50));
        assert!(
            cache.get(&"k".to_string()).is_some(),
            "entry should be alive while being accessed"
        );
    }

    // Now stop accessing and let it expire.
    std::thread::sleep(Duration::from_millis(120));
    assert!(
        cache.get(&"k".to_string()).is_none(),
        "entry should expire after idle period"
    );
}

// ---------------------------------------------------------------------------
// Custom expiry policies
// ---------------------------------------------------------------------------

/// The value itself carries its lifetime.
struct ValueDriven;

impl Expiry<u64, Duration> for ValueDriven {
    fn expire_after_create(&self, _k: &u64, v: &Duration, _now: Instant) -> Option<Duration> {
        Some(*v)
    }
}

#[test]
fn custom_expiry_uses_per_entry_durations() {
    let cache: cortado::Cache<u64, Duration> = CacheBuilder::new().expiry(ValueDriven).build();

    cache.insert(1, Duration::from_millis(40));
    cache.insert(2, Duration::from_secs(10));
    std::thread::sleep(Duration::from_millis(90));

    assert!(cache.get(&1).is_none(), "short-lived entry expired");
    assert!(cache.get(&2).is_some(), "long-lived entry survives");
}

/// Never expires anything.
struct Immortal;

impl<K, V> Expiry<K, V> for Immortal {
    fn expire_after_create(&self, _k: &K, _v: &V, _now: Instant) -> Option<Duration> {
        None
    }
}

#[test]
fn custom_expiry_none_means_no_expiry() {
    let cache: cortado::Cache<String, String> = CacheBuilder::new().expiry(Immortal).build();

    cache.insert("k".to_string(), "v".to_string());
    std::thread::sleep(Duration::from_millis(80));
    assert!(
        cache.get(&"k".to_string()).is_some(),
        "None from the policy means the entry is immortal"
    );
}

// ---------------------------------------------------------------------------
// EvictionListener
// ---------------------------------------------------------------------------

#[test]
fn listener_fires_on_explicit_invalidate() {
    let log: Arc<Mutex<Vec<(u64, EvictionCause)>>> = Arc::new(Mutex::new(Vec::new()));
    let log2 = Arc::clone(&log);

    let cache: cortado::Cache<u64, u64> = CacheBuilder::new()
        .eviction_listener(move |key: &u64, _val, cause| {
            log2.lock().unwrap().push((*key, cause));
        })
        .build();

    cache.insert(42, 420);
    cache.invalidate(&42);

    let events = log.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], (42, EvictionCause::Explicit));
}

#[test]
fn listener_fires_on_ttl_expiry() {
    let log: Arc<Mutex<Vec<EvictionCause>>> = Arc::new(Mutex::new(Vec::new()));
    let log2 = Arc::clone(&log);

    let cache: cortado::Cache<u64, u64> = CacheBuilder::new()
        .time_to_live(Duration::from_millis(50))
        .eviction_listener(move |_key, _val, cause| {
            log2.lock().unwrap().push(cause);
        })
        .build();

    cache.insert(1, 100);

    // Wait for TTL to elapse; expiry is detected inline on `get`.
    std::thread::sleep(Duration::from_millis(100));
    let _ = cache.get(&1); // triggers inline expiry + listener

    let events = log.lock().unwrap();
    assert!(
        events.iter().any(|c| *c == EvictionCause::Expired),
        "expected an Expired event"
    );
}

#[test]
fn wheel_sweep_expires_entries_never_read_again() {
    let log: Arc<Mutex<Vec<(u64, EvictionCause)>>> = Arc::new(Mutex::new(Vec::new()));
    let log2 = Arc::clone(&log);

    let cache: cortado::Cache<u64, u64> = CacheBuilder::new()
        .time_to_live(Duration::from_millis(50))
        .eviction_listener(move |key: &u64, _val, cause| {
            log2.lock().unwrap().push((*key, cause));
        })
        .build();

    cache.insert(7, 700);

    // Outlive the finest wheel tick (~1.07 s) so the next maintenance sweep
    // crosses a bucket boundary and reclaims the entry without it ever
    // being read.
    std::thread::sleep(Duration::from_millis(1_200));
    cache.insert(8, 800); // unrelated write piggy-backs the sweep

    assert!(
        log.lock()
            .unwrap()
            .iter()
            .any(|&(k, c)| k == 7 && c == EvictionCause::Expired),
        "the sweep must deliver the dead entry to the listener"
    );
    assert!(!cache.contains(&7), "expired entry is gone");
    assert!(cache.contains(&8), "fresh entry is untouched");
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_insert_and_get() {
    let cache: Arc<cortado::Cache<String, String>> = Arc::new(
        CacheBuilder::new()
            .time_to_live(Duration::from_secs(60))
            .build(),
    );
    let mut handles = Vec::new();

    for t in 0..8 {
        let c = Arc::clone(&cache);
        handles.push(std::thread::spawn(move || {
            for j in 0..200 {
                let key = format!("t{}-k{}", t, j);
                c.insert(key.clone(), key.clone());
                assert!(c.get(&key).is_some(), "fresh entry must be readable");
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(cache.entry_count(), 1_600);
}

#[test]
fn concurrent_invalidate_is_safe() {
    let cache: Arc<cortado::Cache<u64, u64>> = Arc::new(
        CacheBuilder::new()
            .time_to_live(Duration::from_secs(60))
            .build(),
    );
    for i in 0..1_000u64 {
        cache.insert(i, i);
    }

    let mut handles = Vec::new();
    for t in 0..4u64 {
        let c = Arc::clone(&cache);
        handles.push(std::thread::spawn(move || {
            for i in (t * 250)..((t + 1) * 250) {
                c.invalidate(&i);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert!(cache.is_empty());
}
