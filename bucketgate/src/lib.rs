//! # BucketGate
//!
//! A concurrent token bucket rate limiter that enforces per-client,
//! per-endpoint request quotas.
//!
//! ## Overview
//!
//! Every endpoint that needs protection gets an [`EndpointPolicy`]: a burst
//! capacity and a sustained rate in requests per minute. Each client calling
//! that endpoint gets its own [`TokenBucket`], created on the first request and
//! refilled lazily whenever it is touched:
//! - **No timers**: refill is computed on access, idle clients cost no CPU
//! - **Fine-grained locking**: unrelated clients never wait on each other
//! - **Exactly one bucket per key**, even when the first requests race
//! - **Integer arithmetic** throughout
//!
//! ## Quick Start
//!
//! ```
//! use bucketgate::{Decision, EndpointPolicy, PolicyResolver, RateLimiter};
//! use std::time::Instant;
//!
//! // Burst of 100, refilled at 50 requests per minute
//! let policies = vec![EndpointPolicy::parse("GET /user/:id", 100, 50)?];
//! let limiter = RateLimiter::new(PolicyResolver::new(policies));
//!
//! match limiter.enforce("203.0.113.9", "GET", "/user/:id", Instant::now()) {
//!     Decision::Allowed { remaining, .. } => println!("Allowed! Remaining: {remaining}"),
//!     Decision::Denied { .. } => println!("Rate limited!"),
//!     Decision::Unlimited => println!("Endpoint is not throttled"),
//! }
//! # Ok::<(), bucketgate::PolicyError>(())
//! ```
//!
//! ## Status Queries
//!
//! [`RateLimiter::query_status`] reads a client's bucket without consuming
//! from it and tells apart endpoints without a policy from clients that have
//! not called the endpoint yet:
//!
//! ```
//! use bucketgate::{BucketStatus, EndpointPolicy, PolicyResolver, RateLimiter};
//! use std::time::Instant;
//!
//! let limiter = RateLimiter::new(PolicyResolver::new(vec![
//!     EndpointPolicy::parse("PATCH /user/:id", 10, 6).unwrap(),
//! ]));
//!
//! assert_eq!(limiter.query_status("c", "PATCH", "/user/:id"), BucketStatus::NotSeen);
//! assert_eq!(limiter.query_status("c", "GET", "/user/:id"), BucketStatus::Unlimited);
//!
//! limiter.enforce("c", "PATCH", "/user/:id", Instant::now());
//! assert_eq!(limiter.query_status("c", "PATCH", "/user/:id").available_tokens(), Some(5));
//! ```
//!
//! ## Refill Semantics
//!
//! - A new bucket starts with one minute worth of tokens, capped at its
//!   capacity. A bucket that never refills starts full.
//! - On each access, `elapsed_ms * rate_per_minute / 60000` whole tokens are
//!   added, up to capacity.
//! - [`RefillMode::Carry`] keeps the fractional part between accesses instead
//!   of dropping it.
//!
//! ## Thread Safety
//!
//! [`RateLimiter`] is `Send + Sync` and all of its methods take `&self`. Share
//! it with an [`Arc`](std::sync::Arc):
//!
//! ```
//! use std::sync::Arc;
//! use bucketgate::{PolicyResolver, RateLimiter};
//!
//! let limiter = Arc::new(RateLimiter::new(PolicyResolver::default()));
//! ```
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for faster hashing of registry keys

pub mod core;

pub use core::{
    BucketRegistry, BucketStatus, Consumption, Decision, EndpointPolicy, PolicyError,
    PolicyResolver, RateLimiter, RefillMode, TokenBucket, bucket_key,
};
