//! HTTP handlers
//!
//! # API Endpoints
//!
//! ## GET /take?method=PATCH&route=/user/:id
//!
//! Status of the caller's bucket for one endpoint. Does not consume a token.
//!
//! ```json
//! {"allow": true, "available_tokens": 5}
//! ```
//!
//! Answers `400 Bad Request` with an error body when the endpoint has no
//! policy or the caller never called it.
//!
//! ## GET /health
//!
//! Returns "OK" with 200 status.
//!
//! ## GET /metrics
//!
//! Prometheus text exposition of the counters in [`crate::metrics`].
//!
//! ## Sample endpoints
//!
//! `GET /user/{id}`, `PATCH /user/{id}` and `POST /userinfo` answer with a
//! fixed text body. They exist to be put behind the rate limiter.

use crate::middleware::Gate;
use crate::types::{ErrorResponse, StatusQuery, StatusResponse};
use axum::{
    Json,
    extract::{Query, Request, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use bucketgate::BucketStatus;

pub async fn check_status(
    State(gate): State<Gate>,
    Query(query): Query<StatusQuery>,
    request: Request,
) -> Result<Json<StatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let client = gate.client_identity(request.headers(), request.extensions());

    match gate
        .limiter()
        .query_status(&client, &query.method, &query.route)
    {
        BucketStatus::Active {
            available_tokens, ..
        } => Ok(Json(StatusResponse {
            allow: available_tokens > 0,
            available_tokens,
        })),
        BucketStatus::NotSeen => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!(
                "endpoint not initialized: {} {} was never called by this client",
                query.method, query.route
            ))),
        )),
        BucketStatus::Unlimited => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!(
                "invalid input data: no rate limit configured for {} {}",
                query.method, query.route
            ))),
        )),
    }
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn metrics(State(gate): State<Gate>) -> impl IntoResponse {
    let metrics = gate.metrics();
    metrics.update_active_buckets(gate.limiter().registry().len());

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.export_prometheus(),
    )
}

pub async fn get_user() -> &'static str {
    "Hello World with user id"
}

pub async fn patch_user() -> &'static str {
    "this is patch user id"
}

pub async fn post_user_info() -> &'static str {
    "this is post user info"
}
