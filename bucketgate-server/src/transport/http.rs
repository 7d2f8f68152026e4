//! HTTP transport
//!
//! Serves the routes of [`crate::handlers`], with the sample endpoints put
//! behind the rate limiting middleware under the policy patterns
//! `GET /user/:id`, `PATCH /user/:id` and `POST /userinfo`.

use super::Transport;
use crate::handlers;
use crate::middleware::{Gate, rate_limited};
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    http::Method,
    routing::{get, patch, post},
};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the application router
pub fn router(gate: Gate) -> Router {
    Router::new()
        .route(
            "/user/{id}",
            rate_limited(get(handlers::get_user), &gate, Method::GET, "/user/:id").merge(
                rate_limited(
                    patch(handlers::patch_user),
                    &gate,
                    Method::PATCH,
                    "/user/:id",
                ),
            ),
        )
        .route(
            "/userinfo",
            rate_limited(
                post(handlers::post_user_info),
                &gate,
                Method::POST,
                "/userinfo",
            ),
        )
        .route("/take", get(handlers::check_status))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(gate)
}

/// HTTP transport implementation
pub struct HttpTransport {
    addr: SocketAddr,
}

impl HttpTransport {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(self, gate: Gate) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("HTTP server listening on {}", listener.local_addr()?);

        serve(listener, gate, shutdown_signal()).await
    }
}

/// Serve the router on `listener` until `shutdown` resolves
///
/// Peer addresses are recorded on every request so the middleware can
/// identify clients.
pub async fn serve<F>(listener: TcpListener, gate: Gate, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        router(gate).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received, draining connections"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
