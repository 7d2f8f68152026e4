//! Per-request enforcement and status queries
//!
//! [`RateLimiter`] ties the pieces together: it resolves the endpoint policy,
//! derives the registry key, fetches or creates the bucket and consumes from
//! it. It also answers read-only status questions for a client and endpoint.

use super::{BucketRegistry, PolicyResolver, RefillMode, bucket_key};
use std::time::Instant;

/// Result of enforcing the quota for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No policy covers the endpoint; the request is not throttled
    Unlimited,
    /// A token was taken
    Allowed {
        /// Tokens left for this client and endpoint
        remaining: u64,
        /// Capacity of the bucket
        limit: u64,
    },
    /// The bucket is empty
    Denied {
        /// Capacity of the bucket
        limit: u64,
    },
}

impl Decision {
    /// Whether the request may proceed
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Denied { .. })
    }

    /// Tokens left after this request, `None` when the endpoint is unlimited
    pub fn remaining(&self) -> Option<u64> {
        match self {
            Decision::Unlimited => None,
            Decision::Allowed { remaining, .. } => Some(*remaining),
            Decision::Denied { .. } => Some(0),
        }
    }

    /// Bucket capacity, `None` when the endpoint is unlimited
    pub fn limit(&self) -> Option<u64> {
        match self {
            Decision::Unlimited => None,
            Decision::Allowed { limit, .. } | Decision::Denied { limit } => Some(*limit),
        }
    }
}

/// Read-only view of a client's bucket for one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    /// The client has a bucket for this endpoint
    Active {
        /// Tokens currently stored in the bucket
        available_tokens: u64,
        /// Capacity of the bucket
        capacity: u64,
    },
    /// The endpoint has a policy but the client never called it
    NotSeen,
    /// No policy covers the endpoint
    Unlimited,
}

impl BucketStatus {
    /// Whether a bucket exists; `NotSeen` and `Unlimited` both count as not found
    pub fn is_found(&self) -> bool {
        matches!(self, BucketStatus::Active { .. })
    }

    pub fn available_tokens(&self) -> Option<u64> {
        match self {
            BucketStatus::Active {
                available_tokens, ..
            } => Some(*available_tokens),
            _ => None,
        }
    }
}

/// Token bucket rate limiter keyed by client and endpoint
///
/// The limiter owns the policy snapshot and the bucket registry. Share it
/// between request handlers behind an [`Arc`](std::sync::Arc); every method
/// takes `&self`.
///
/// # Example
///
/// ```
/// use bucketgate::{Decision, EndpointPolicy, PolicyResolver, RateLimiter};
/// use std::time::Instant;
///
/// let limiter = RateLimiter::new(PolicyResolver::new(vec![
///     EndpointPolicy::parse("POST /userinfo", 5, 2).unwrap(),
/// ]));
///
/// let now = Instant::now();
/// assert_eq!(
///     limiter.enforce("10.0.0.7", "POST", "/userinfo", now),
///     Decision::Allowed { remaining: 1, limit: 5 }
/// );
/// assert_eq!(
///     limiter.enforce("10.0.0.7", "GET", "/health", now),
///     Decision::Unlimited
/// );
/// ```
#[derive(Debug, Default)]
pub struct RateLimiter {
    resolver: PolicyResolver,
    registry: BucketRegistry,
}

impl RateLimiter {
    /// Create a limiter over `resolver` with an empty registry
    pub fn new(resolver: PolicyResolver) -> Self {
        Self::with_registry(resolver, BucketRegistry::new())
    }

    /// Create a limiter whose buckets use the given [`RefillMode`]
    pub fn with_mode(resolver: PolicyResolver, mode: RefillMode) -> Self {
        Self::with_registry(resolver, BucketRegistry::with_mode(mode))
    }

    pub fn with_registry(resolver: PolicyResolver, registry: BucketRegistry) -> Self {
        RateLimiter { resolver, registry }
    }

    /// Enforce the quota of `method` `path` for `client`
    ///
    /// Endpoints without a policy are never throttled and never get a bucket.
    /// Otherwise the client's bucket is created on first use and one token is
    /// taken from it.
    pub fn enforce(&self, client: &str, method: &str, path: &str, now: Instant) -> Decision {
        let Some(policy) = self.resolver.resolve(method, path) else {
            return Decision::Unlimited;
        };

        let key = bucket_key(client, policy.method(), policy.path());
        let bucket = self.registry.get_or_create(&key, policy, now);
        let limit = bucket.capacity();

        let consumption = bucket.try_consume(now);
        if consumption.allowed {
            Decision::Allowed {
                remaining: consumption.remaining,
                limit,
            }
        } else {
            Decision::Denied { limit }
        }
    }

    /// Report the bucket state of `client` for `method` `path` without touching it
    pub fn query_status(&self, client: &str, method: &str, path: &str) -> BucketStatus {
        if self.resolver.resolve(method, path).is_none() {
            return BucketStatus::Unlimited;
        }

        match self.registry.get(&bucket_key(client, method, path)) {
            Some(bucket) => BucketStatus::Active {
                available_tokens: bucket.available_tokens(),
                capacity: bucket.capacity(),
            },
            None => BucketStatus::NotSeen,
        }
    }

    pub fn resolver(&self) -> &PolicyResolver {
        &self.resolver
    }

    pub fn registry(&self) -> &BucketRegistry {
        &self.registry
    }
}
