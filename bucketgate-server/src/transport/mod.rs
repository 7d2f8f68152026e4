//! Transport layer for the rate limiting server
//!
//! Transports implement the [`Transport`] trait and run the HTTP surface on
//! top of a shared [`Gate`].
//!
//! # Available Transports
//!
//! - [`http`]: axum HTTP server with rate limited routes

pub mod http;


use crate::middleware::Gate;
use anyhow::Result;
use async_trait::async_trait;

/// Common interface for transport implementations
///
/// Each transport is responsible for:
/// - Accepting client connections
/// - Routing requests through the rate limiting middleware
/// - Sending responses back to clients
#[async_trait]
pub trait Transport {
    /// Start the transport server
    ///
    /// Runs until the server shuts down or an error occurs.
    async fn start(self, gate: Gate) -> Result<()>;
}
