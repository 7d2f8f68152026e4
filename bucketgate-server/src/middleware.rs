//! Rate limiting middleware for axum routes
//!
//! [`rate_limited`] wraps a route with a guard bound to one endpoint, given as
//! an HTTP method and the route pattern used in the policy file. For every
//! request the guard identifies the client, asks the [`RateLimiter`] for a
//! decision and either forwards the request or rejects it.
//!
//! ```ignore
//! let app = Router::new().route(
//!     "/user/{id}",
//!     rate_limited(get(get_user), &gate, Method::GET, "/user/:id"),
//! );
//! ```
//!
//! Admitted requests carry the [`Decision`] in their extensions and the
//! response gets `x-ratelimit-limit` / `x-ratelimit-remaining` headers.

use crate::metrics::Metrics;
use crate::types::ErrorResponse;
use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::MethodRouter,
};
use bucketgate::{Decision, RateLimiter};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

const UNKNOWN_CLIENT: &str = "unknown";

/// Shared state of the rate limiting boundary
///
/// Cheap to clone; every clone refers to the same limiter and metrics.
#[derive(Clone)]
pub struct Gate {
    limiter: Arc<RateLimiter>,
    metrics: Arc<Metrics>,
    reject_status: StatusCode,
    trust_forwarded_headers: bool,
}

impl Gate {
    /// Create a gate that rejects with `429 Too Many Requests` and identifies
    /// clients by their peer address
    pub fn new(limiter: Arc<RateLimiter>, metrics: Arc<Metrics>) -> Self {
        Gate {
            limiter,
            metrics,
            reject_status: StatusCode::TOO_MANY_REQUESTS,
            trust_forwarded_headers: false,
        }
    }

    /// Status code sent to clients that ran out of tokens
    pub fn with_reject_status(mut self, status: StatusCode) -> Self {
        self.reject_status = status;
        self
    }

    /// Identify clients by `X-Forwarded-For` / `X-Real-IP` when present
    pub fn with_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Client identity used as the first part of the registry key
    ///
    /// The peer IP address, or the first forwarded address when forwarded
    /// headers are trusted and it parses as an IP address. Falls back to
    /// `"unknown"`.
    pub fn client_identity(&self, headers: &HeaderMap, extensions: &Extensions) -> String {
        if self.trust_forwarded_headers {
            if let Some(client) = forwarded_client(headers) {
                return client.to_string();
            }
        }

        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

fn forwarded_client(headers: &HeaderMap) -> Option<IpAddr> {
    let first_forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|value| value.trim().parse::<IpAddr>().ok());

    first_forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<IpAddr>().ok())
    })
}

/// Guard state for one endpoint
#[derive(Clone)]
struct EndpointGuard {
    gate: Gate,
    method: Method,
    pattern: Arc<str>,
}

/// Put `route` behind the rate limit of endpoint `method` `pattern`
///
/// `pattern` is matched against the policy file, not against the request
/// path, so every request to the route shares the endpoint's quota whatever
/// its path parameters are. The policy is looked up once here; a route
/// whose endpoint has no policy only gets its requests counted as unlimited.
pub fn rate_limited<S>(
    route: MethodRouter<S>,
    gate: &Gate,
    method: Method,
    pattern: &str,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    if gate.limiter.resolver().resolve(method.as_str(), pattern).is_none() {
        tracing::debug!("No policy for {} {}, route left unlimited", method, pattern);
        return route.route_layer(middleware::from_fn_with_state(gate.clone(), count_unlimited));
    }

    let guard = EndpointGuard {
        gate: gate.clone(),
        method,
        pattern: Arc::from(pattern),
    };
    route.route_layer(middleware::from_fn_with_state(guard, enforce))
}

async fn enforce(
    State(guard): State<EndpointGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let client = guard
        .gate
        .client_identity(request.headers(), request.extensions());

    let started = Instant::now();
    let decision = guard.gate.limiter.enforce(
        &client,
        guard.method.as_str(),
        &guard.pattern,
        started,
    );
    guard
        .gate
        .metrics
        .record_decision(&decision, started.elapsed().as_micros() as u64);

    match decision {
        Decision::Denied { limit } => {
            tracing::debug!(
                "Rejected {} {} for client {}",
                guard.method,
                guard.pattern,
                client
            );
            let mut response = (
                guard.gate.reject_status,
                Json(ErrorResponse::new("request rejected: client has no tokens")),
            )
                .into_response();
            set_rate_limit_headers(response.headers_mut(), limit, 0);
            response
        }
        Decision::Allowed { remaining, limit } => {
            request.extensions_mut().insert(decision);
            let mut response = next.run(request).await;
            set_rate_limit_headers(response.headers_mut(), limit, remaining);
            response
        }
        Decision::Unlimited => pass_unlimited(request, next).await,
    }
}

async fn count_unlimited(State(gate): State<Gate>, request: Request, next: Next) -> Response {
    gate.metrics.record_decision(&Decision::Unlimited, 0);
    pass_unlimited(request, next).await
}

async fn pass_unlimited(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(Decision::Unlimited);
    next.run(request).await
}

fn set_rate_limit_headers(headers: &mut HeaderMap, limit: u64, remaining: u64) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
}
