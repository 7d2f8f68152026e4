//! Concurrent registry of token buckets
//!
//! The [`BucketRegistry`] owns one [`TokenBucket`] per registry key and hands
//! out shared handles to it. The map is sharded, so lookups and insertions for
//! unrelated keys proceed in parallel.
//!
//! # Memory
//!
//! Buckets are never evicted. Every distinct (client, endpoint) pair that has
//! made a throttled request keeps its bucket for the lifetime of the registry,
//! so memory grows with the number of distinct clients seen.

use super::{EndpointPolicy, RefillMode, TokenBucket};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "ahash")]
use ahash::RandomState;
#[cfg(not(feature = "ahash"))]
use std::collections::hash_map::RandomState;

#[cfg(test)]
mod tests;

/// Build the registry key for a client calling an endpoint
///
/// # Example
///
/// ```
/// assert_eq!(
///     bucketgate::bucket_key("10.0.0.7", "GET", "/user/:id"),
///     "10.0.0.7-GET /user/:id"
/// );
/// ```
pub fn bucket_key(client: &str, method: &str, path: &str) -> String {
    format!("{client}-{method} {path}")
}

/// Process-wide map from registry key to token bucket
///
/// # Example
///
/// ```
/// use bucketgate::{BucketRegistry, EndpointPolicy};
/// use std::sync::Arc;
/// use std::time::Instant;
///
/// let registry = BucketRegistry::new();
/// let policy = EndpointPolicy::parse("GET /user/:id", 10, 6).unwrap();
///
/// let now = Instant::now();
/// let first = registry.get_or_create("10.0.0.7-GET /user/:id", &policy, now);
/// let again = registry.get_or_create("10.0.0.7-GET /user/:id", &policy, now);
/// assert!(Arc::ptr_eq(&first, &again));
/// assert!(registry.get("10.0.0.8-GET /user/:id").is_none());
/// ```
#[derive(Debug)]
pub struct BucketRegistry {
    buckets: DashMap<String, Arc<TokenBucket>, RandomState>,
    mode: RefillMode,
}

impl BucketRegistry {
    /// Create an empty registry whose buckets truncate fractional refill
    pub fn new() -> Self {
        Self::with_mode(RefillMode::Truncate)
    }

    /// Create an empty registry whose buckets use `mode`
    pub fn with_mode(mode: RefillMode) -> Self {
        BucketRegistry {
            buckets: DashMap::with_hasher(RandomState::default()),
            mode,
        }
    }

    /// Return the bucket for `key`, creating it from `policy` on first use
    ///
    /// Creation happens under the shard lock of `key`, so when callers race on
    /// a new key exactly one bucket is built and every caller receives it.
    /// `now` becomes the new bucket's last refill time.
    pub fn get_or_create(
        &self,
        key: &str,
        policy: &EndpointPolicy,
        now: Instant,
    ) -> Arc<TokenBucket> {
        if let Some(bucket) = self.buckets.get(key) {
            return Arc::clone(bucket.value());
        }

        let bucket = self.buckets.entry(key.to_string()).or_insert_with(|| {
            Arc::new(TokenBucket::with_mode(
                policy.burst(),
                policy.sustained_per_minute(),
                self.mode,
                now,
            ))
        });
        Arc::clone(bucket.value())
    }

    /// Look up the bucket for `key` without creating one
    pub fn get(&self, key: &str) -> Option<Arc<TokenBucket>> {
        self.buckets.get(key).map(|bucket| Arc::clone(bucket.value()))
    }

    /// Number of buckets created so far
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn mode(&self) -> RefillMode {
        self.mode
    }
}

impl Default for BucketRegistry {
    fn default() -> Self {
        Self::new()
    }
}
