//! Wire types shared by the HTTP handlers
//!
//! # Example
//!
//! A status query for a client with five tokens left:
//!
//! ```json
//! {
//!   "allow": true,
//!   "available_tokens": 5
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Query string of the status endpoint, `?method=GET&route=/user/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusQuery {
    /// HTTP method of the endpoint
    pub method: String,
    /// Route pattern of the endpoint, as written in the policy file
    pub route: String,
}

/// Bucket status of the calling client for one endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Whether the next request would currently be allowed
    pub allow: bool,
    /// Tokens currently in the bucket
    pub available_tokens: u64,
}

/// Error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
        }
    }
}
