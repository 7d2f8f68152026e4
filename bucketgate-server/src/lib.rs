//! # BucketGate Server
//!
//! HTTP server that puts endpoints behind per-client, per-endpoint token
//! bucket quotas.
//!
//! ## Purpose
//!
//! Every endpoint listed in the policy file gets its own quota: a burst
//! capacity and a sustained refill rate per minute. Each client (identified
//! by IP address) gets a separate bucket for each endpoint it calls, so one
//! noisy client cannot exhaust the quota of another. Endpoints without a
//! policy are not limited at all.
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! bucketgate --help
//!
//! # Serve on port 8080 with the policies of ./config.json
//! bucketgate --port 8080 --policies config.json
//!
//! # Reject with 400 instead of 429 and refill with fractional carry-over
//! bucketgate --reject-status 400 --refill carry
//! ```
//!
//! ## Configuration
//!
//! Configure via CLI arguments or environment variables (CLI takes precedence):
//!
//! ```bash
//! export BUCKETGATE_PORT=9090
//! export BUCKETGATE_POLICIES=/etc/bucketgate/policies.toml
//! bucketgate
//!
//! # List all available environment variables
//! bucketgate --list-env-vars
//! ```
//!
//! ### Policy File
//!
//! ```json
//! {
//!   "rateLimitsPerEndpoint": [
//!     { "endpoint": "GET /user/:id", "burst": 10, "sustained": 6 },
//!     { "endpoint": "PATCH /user/:id", "burst": 5, "sustained": 3 },
//!     { "endpoint": "POST /userinfo", "burst": 2, "sustained": 1 }
//!   ]
//! }
//! ```
//!
//! The file is read once at start-up. A missing or malformed file stops the
//! server.
//!
//! ## Endpoints
//!
//! - `GET /user/{id}`, `PATCH /user/{id}`, `POST /userinfo`: sample endpoints
//!   behind the rate limiter
//! - `GET /take?method=GET&route=/user/:id`: bucket status of the caller
//! - `GET /health`: liveness check
//! - `GET /metrics`: Prometheus metrics
//!
//! Rejected requests get `429 Too Many Requests` (configurable) with a JSON
//! error body. Admitted requests get `x-ratelimit-limit` and
//! `x-ratelimit-remaining` response headers.
//!
//! ## Architecture
//!
//! ```text
//!        HTTP request
//!             │
//!      ┌──────▼──────┐
//!      │  Middleware │  client IP + (method, route pattern)
//!      └──────┬──────┘
//!             │
//!      ┌──────▼──────┐
//!      │ RateLimiter │  policy lookup, bucket registry
//!      └──────┬──────┘
//!             │
//!      ┌──────▼──────┐
//!      │ TokenBucket │  refill + consume under a per-bucket lock
//!      └─────────────┘
//! ```
//!
//! Handlers share the limiter directly; requests for different buckets never
//! contend on a common lock.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod transport;
pub mod types;
