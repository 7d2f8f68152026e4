use anyhow::Result;
use axum::http::StatusCode;
use std::sync::Arc;

use bucketgate::RateLimiter;
use bucketgate_server::config::{Config, load_policies};
use bucketgate_server::metrics::Metrics;
use bucketgate_server::middleware::Gate;
use bucketgate_server::transport::{Transport, http::HttpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("bucketgate={}", config.log_level).parse()?)
                .add_directive(format!("bucketgate_server={}", config.log_level).parse()?),
        )
        .init();

    // A server without its policies must not start
    let resolver = match load_policies(&config.policy_file) {
        Ok(resolver) => resolver,
        Err(e) => {
            tracing::error!(
                "Failed to load policies from {}: {:#}",
                config.policy_file.display(),
                e
            );
            return Err(e);
        }
    };

    tracing::info!(
        "Loaded {} endpoint policies from {}",
        resolver.len(),
        config.policy_file.display()
    );
    for policy in resolver.policies() {
        tracing::debug!(
            "Policy {}: burst {}, sustained {}/min",
            policy.endpoint(),
            policy.burst(),
            policy.sustained_per_minute()
        );
    }

    let limiter = Arc::new(RateLimiter::with_mode(resolver, config.refill.into()));
    let gate = Gate::new(limiter, Arc::new(Metrics::new()))
        .with_reject_status(StatusCode::from_u16(config.reject_status)?)
        .with_forwarded_headers(config.trust_forwarded_headers);

    let addr = config.http.socket_addr()?;
    tracing::info!(
        "BucketGate server starting on {} with {:?} refill",
        addr,
        config.refill
    );

    HttpTransport::new(addr).start(gate).await?;

    tracing::info!("BucketGate server stopped");
    Ok(())
}
