use super::{BucketRegistry, bucket_key};
use crate::core::{EndpointPolicy, RefillMode};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::time::Instant;

fn policy() -> EndpointPolicy {
    EndpointPolicy::parse("GET /user/:id", 100, 50).unwrap()
}

#[test]
fn test_create_on_first_use() {
    let registry = BucketRegistry::new();
    assert!(registry.is_empty());

    let bucket = registry.get_or_create("client-a", &policy(), Instant::now());
    assert_eq!(bucket.capacity(), 100);
    assert_eq!(bucket.refill_per_minute(), 50);
    assert_eq!(bucket.available_tokens(), 50);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_existing_bucket_is_reused() {
    let registry = BucketRegistry::new();
    let now = Instant::now();

    let first = registry.get_or_create("client-a", &policy(), now);
    first.try_consume(now);

    // A different policy does not replace an existing bucket
    let other = EndpointPolicy::parse("GET /user/:id", 1, 1).unwrap();
    let second = registry.get_or_create("client-a", &other, now);

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.available_tokens(), 49);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_get_never_creates() {
    let registry = BucketRegistry::new();
    assert!(registry.get("client-a").is_none());
    assert!(registry.is_empty());

    let created = registry.get_or_create("client-a", &policy(), Instant::now());
    let found = registry.get("client-a").unwrap();
    assert!(Arc::ptr_eq(&created, &found));
}

#[test]
fn test_keys_are_independent() {
    let registry = BucketRegistry::new();
    let now = Instant::now();

    let a = registry.get_or_create("client-a", &policy(), now);
    let b = registry.get_or_create("client-b", &policy(), now);
    for _ in 0..50 {
        a.try_consume(now);
    }

    assert!(!a.try_consume(now).allowed);
    assert!(b.try_consume(now).allowed);
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_registry_mode_reaches_buckets() {
    let registry = BucketRegistry::with_mode(RefillMode::Carry);
    assert_eq!(registry.mode(), RefillMode::Carry);

    let bucket = registry.get_or_create("client-a", &policy(), Instant::now());
    assert_eq!(bucket.mode(), RefillMode::Carry);
}

#[test]
fn test_concurrent_first_access_creates_one_bucket() {
    const THREADS: usize = 16;

    let registry = BucketRegistry::new();
    let barrier = Barrier::new(THREADS);
    let now = Instant::now();

    let buckets: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    registry.get_or_create("contended", &policy(), now)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let distinct: HashSet<_> = buckets.iter().map(Arc::as_ptr).collect();
    assert_eq!(distinct.len(), 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_concurrent_distinct_keys() {
    let registry = BucketRegistry::new();
    let now = Instant::now();

    std::thread::scope(|s| {
        for t in 0..8 {
            let registry = &registry;
            s.spawn(move || {
                for i in 0..100 {
                    let key = bucket_key(&format!("10.0.{t}.{i}"), "GET", "/user/:id");
                    assert!(registry.get_or_create(&key, &policy(), now).try_consume(now).allowed);
                }
            });
        }
    });

    assert_eq!(registry.len(), 800);
}

#[test]
fn test_bucket_key_format() {
    assert_eq!(
        bucket_key("127.0.0.1", "PATCH", "/user/:id"),
        "127.0.0.1-PATCH /user/:id"
    );
}
