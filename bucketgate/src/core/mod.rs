//! Core components of the bucketgate rate limiting library
//!
//! This module contains the fundamental building blocks:
//! - [`bucket`]: The token bucket and its refill arithmetic
//! - [`registry`]: Concurrent storage of buckets per client and endpoint
//! - [`policy`]: Endpoint quota policies and their resolution
//! - [`rate_limiter`]: Per-request enforcement and status queries

pub mod bucket;
pub mod policy;
pub mod rate_limiter;
pub mod registry;

pub use bucket::{Consumption, RefillMode, TokenBucket};
pub use policy::{EndpointPolicy, PolicyResolver};
pub use rate_limiter::{BucketStatus, Decision, RateLimiter};
pub use registry::{BucketRegistry, bucket_key};

use std::error::Error;
use std::fmt;

/// Errors raised while building endpoint policies
///
/// Rate limiting itself never fails: an exhausted quota is reported through
/// [`Decision::Denied`] and an unknown bucket through [`BucketStatus`].
///
/// # Example
///
/// ```
/// use bucketgate::{EndpointPolicy, PolicyError};
///
/// match EndpointPolicy::parse("GET", 10, 6) {
///     Err(PolicyError::MalformedEndpoint(endpoint)) => {
///         println!("bad endpoint: {endpoint}");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The endpoint is not of the form `"<METHOD> <path>"`
    MalformedEndpoint(String),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::MalformedEndpoint(endpoint) => {
                write!(f, "malformed endpoint {endpoint:?}, expected \"<METHOD> <path>\"")
            }
        }
    }
}

impl Error for PolicyError {}
