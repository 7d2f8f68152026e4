//! Server configuration, CLI argument parsing and policy file loading
//!
//! Server settings come from:
//! - Command-line arguments
//! - Environment variables (with BUCKETGATE_ prefix)
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! Endpoint quotas live in a separate policy file, read once at start-up:
//!
//! ```json
//! {
//!   "rateLimitsPerEndpoint": [
//!     { "endpoint": "GET /user/:id", "burst": 10, "sustained": 6 },
//!     { "endpoint": "PATCH /user/:id", "burst": 5, "sustained": 3 }
//!   ]
//! }
//! ```
//!
//! The format follows the file extension (`.json`, `.toml`, `.yaml`). Any
//! problem with the file is fatal: the server never starts with a partial or
//! broken policy set.
//!
//! # Example Usage
//!
//! ```bash
//! # Using CLI arguments
//! bucketgate --policies ./config.json --port 9090
//!
//! # Using environment variables
//! export BUCKETGATE_POLICIES=/etc/bucketgate/config.json
//! export BUCKETGATE_REJECT_STATUS=400
//! bucketgate
//! ```

use anyhow::{Context, Result, anyhow};
use bucketgate::{EndpointPolicy, PolicyResolver, RefillMode};
use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main configuration structure for the server
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listener configuration
    pub http: HttpConfig,
    /// Path of the endpoint policy file
    pub policy_file: PathBuf,
    /// Status code returned when a client runs out of tokens
    pub reject_status: u16,
    /// Take the client address from X-Forwarded-For / X-Real-IP
    pub trust_forwarded_headers: bool,
    /// How buckets convert elapsed time into tokens
    pub refill: RefillStrategy,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// HTTP listener configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl HttpConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

/// Refill strategy selectable from the command line
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RefillStrategy {
    /// Drop fractional tokens on every access
    Truncate,
    /// Carry fractional tokens over to the next access
    Carry,
}

impl std::str::FromStr for RefillStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "truncate" => Ok(RefillStrategy::Truncate),
            "carry" => Ok(RefillStrategy::Carry),
            _ => Err(anyhow!(
                "Invalid refill strategy: {}. Valid options are: truncate, carry",
                s
            )),
        }
    }
}

impl From<RefillStrategy> for RefillMode {
    fn from(strategy: RefillStrategy) -> Self {
        match strategy {
            RefillStrategy::Truncate => RefillMode::Truncate,
            RefillStrategy::Carry => RefillMode::Carry,
        }
    }
}

/// Command-line arguments for the server
///
/// All arguments can also be set via environment variables with the
/// BUCKETGATE_ prefix. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(
    name = "bucketgate",
    about = "Per-client, per-endpoint token bucket rate limiting server",
    long_about = "Serves HTTP endpoints behind a token bucket rate limiting middleware.\n\nQuotas are read once from the policy file at start-up.\n\nEnvironment variables with BUCKETGATE_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    #[arg(
        long,
        value_name = "HOST",
        help = "HTTP host",
        default_value = "127.0.0.1",
        env = "BUCKETGATE_HOST"
    )]
    pub host: String,
    #[arg(
        long,
        value_name = "PORT",
        help = "HTTP port",
        default_value_t = 8080,
        env = "BUCKETGATE_PORT"
    )]
    pub port: u16,

    // Rate limiting
    #[arg(
        long,
        value_name = "PATH",
        help = "Endpoint policy file (json, toml or yaml)",
        default_value = "config.json",
        env = "BUCKETGATE_POLICIES"
    )]
    pub policies: PathBuf,
    #[arg(
        long,
        value_name = "CODE",
        help = "HTTP status returned to clients without tokens",
        default_value_t = 429,
        env = "BUCKETGATE_REJECT_STATUS"
    )]
    pub reject_status: u16,
    #[arg(
        long,
        help = "Identify clients by X-Forwarded-For / X-Real-IP headers",
        env = "BUCKETGATE_TRUST_FORWARDED_HEADERS"
    )]
    pub trust_forwarded_headers: bool,
    #[arg(
        long,
        value_name = "STRATEGY",
        help = "Refill strategy: truncate, carry",
        default_value = "truncate",
        env = "BUCKETGATE_REFILL"
    )]
    pub refill: RefillStrategy,

    // General options
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "BUCKETGATE_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration is invalid.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        let config = Config::from_args(args);
        config.validate()?;

        Ok(config)
    }

    fn from_args(args: Args) -> Self {
        Config {
            http: HttpConfig {
                host: args.host,
                port: args.port,
            },
            policy_file: args.policies,
            reject_status: args.reject_status,
            trust_forwarded_headers: args.trust_forwarded_headers,
            refill: args.refill,
            log_level: args.log_level,
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the listen address does not parse or the rejection
    /// status is not a 4xx client error.
    pub fn validate(&self) -> Result<()> {
        self.http.socket_addr()?;

        if !(400..=499).contains(&self.reject_status) {
            return Err(anyhow!(
                "Reject status must be a 4xx client error, got {}",
                self.reject_status
            ));
        }

        Ok(())
    }

    fn print_env_vars() {
        println!("BucketGate Environment Variables");
        println!("================================");
        println!();
        println!("All environment variables use the BUCKETGATE_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("HTTP Configuration:");
        println!("  BUCKETGATE_HOST=<host>                      HTTP host [default: 127.0.0.1]");
        println!("  BUCKETGATE_PORT=<port>                      HTTP port [default: 8080]");
        println!();

        println!("Rate Limiting:");
        println!(
            "  BUCKETGATE_POLICIES=<path>                  Endpoint policy file [default: config.json]"
        );
        println!(
            "  BUCKETGATE_REJECT_STATUS=<code>             Status for rejected requests [default: 429]"
        );
        println!(
            "  BUCKETGATE_TRUST_FORWARDED_HEADERS=true|false  Use X-Forwarded-For / X-Real-IP"
        );
        println!(
            "  BUCKETGATE_REFILL=<strategy>                Refill strategy: truncate, carry [default: truncate]"
        );
        println!();

        println!("General Configuration:");
        println!(
            "  BUCKETGATE_LOG_LEVEL=<level>                Log level: error, warn, info, debug, trace [default: info]"
        );
    }
}

/// Policy file layout
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyFile {
    #[serde(
        rename = "rateLimitsPerEndpoint",
        alias = "ratelimitsperendpoint",
        default
    )]
    pub rate_limits_per_endpoint: Vec<PolicyRecord>,
}

/// One policy entry as written in the policy file
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyRecord {
    /// `"<METHOD> <path>"`
    pub endpoint: String,
    /// Bucket capacity
    pub burst: u64,
    /// Refill rate per minute
    pub sustained: u64,
}

impl PolicyFile {
    /// Read and deserialize the policy file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .build()
            .and_then(|raw| raw.try_deserialize::<PolicyFile>())
            .with_context(|| format!("failed to load policy file {}", path.display()))
    }

    /// Convert the records into a resolver, keeping their order
    pub fn into_resolver(self) -> Result<PolicyResolver> {
        self.rate_limits_per_endpoint
            .into_iter()
            .map(|record| {
                EndpointPolicy::parse(&record.endpoint, record.burst, record.sustained)
                    .map_err(anyhow::Error::from)
            })
            .collect::<Result<Vec<_>>>()
            .map(PolicyResolver::new)
    }
}

/// Load the endpoint policies configured in `path`
///
/// # Errors
///
/// Returns an error if the file is missing or unreadable, does not match the
/// expected layout, or contains a malformed endpoint.
pub fn load_policies(path: &Path) -> Result<PolicyResolver> {
    PolicyFile::load(path)?
        .into_resolver()
        .with_context(|| format!("invalid policy in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::str::FromStr;
    use tempfile::NamedTempFile;

    fn config() -> Config {
        Config {
            http: HttpConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            policy_file: PathBuf::from("config.json"),
            reject_status: 429,
            trust_forwarded_headers: false,
            refill: RefillStrategy::Truncate,
            log_level: "info".to_string(),
        }
    }

    // The suffix selects the file format
    fn write_policy_file(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("bucketgate-")
            .suffix(suffix)
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_refill_strategy_from_str() {
        assert_eq!(
            RefillStrategy::from_str("truncate").unwrap(),
            RefillStrategy::Truncate
        );
        assert_eq!(
            RefillStrategy::from_str("CARRY").unwrap(),
            RefillStrategy::Carry
        );
        assert!(RefillStrategy::from_str("invalid").is_err());
        assert_eq!(RefillMode::from(RefillStrategy::Carry), RefillMode::Carry);
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());

        let mut bad_status = config();
        bad_status.reject_status = 200;
        assert!(bad_status.validate().is_err());

        let mut bad_host = config();
        bad_host.http.host = "not a host".to_string();
        assert!(bad_host.validate().is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["bucketgate"]).unwrap();
        let config = Config::from_args(args);

        assert_eq!(config.http.port, 8080);
        assert_eq!(config.reject_status, 429);
        assert_eq!(config.refill, RefillStrategy::Truncate);
        assert_eq!(config.policy_file, PathBuf::from("config.json"));
        assert!(!config.trust_forwarded_headers);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "bucketgate",
            "--port",
            "9090",
            "--policies",
            "/etc/bucketgate/limits.toml",
            "--reject-status",
            "400",
            "--trust-forwarded-headers",
            "--refill",
            "carry",
        ])
        .unwrap();
        let config = Config::from_args(args);

        assert_eq!(config.http.port, 9090);
        assert_eq!(config.reject_status, 400);
        assert_eq!(config.refill, RefillStrategy::Carry);
        assert!(config.trust_forwarded_headers);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_json_policies() {
        let file = write_policy_file(
            ".json",
            r#"{
                "rateLimitsPerEndpoint": [
                    {"endpoint": "GET /user/:id", "burst": 10, "sustained": 6},
                    {"endpoint": "PATCH /user/:id", "burst": 5, "sustained": 3},
                    {"endpoint": "POST /userinfo", "burst": 2, "sustained": 1}
                ]
            }"#,
        );

        let resolver = load_policies(file.path()).unwrap();
        assert_eq!(resolver.len(), 3);

        // Order is preserved
        let endpoints: Vec<_> = resolver.policies().iter().map(|p| p.endpoint()).collect();
        assert_eq!(
            endpoints,
            ["GET /user/:id", "PATCH /user/:id", "POST /userinfo"]
        );

        let patch = resolver.resolve("PATCH", "/user/:id").unwrap();
        assert_eq!(patch.burst(), 5);
        assert_eq!(patch.sustained_per_minute(), 3);
    }

    #[test]
    fn test_load_toml_policies() {
        let file = write_policy_file(
            ".toml",
            r#"
            [[rateLimitsPerEndpoint]]
            endpoint = "GET /user/:id"
            burst = 10
            sustained = 6
            "#,
        );

        let resolver = load_policies(file.path()).unwrap();
        assert_eq!(resolver.len(), 1);
        assert!(resolver.resolve("GET", "/user/:id").is_some());
    }

    #[test]
    fn test_empty_policy_file() {
        let file = write_policy_file(".json", "{}");

        let resolver = load_policies(file.path()).unwrap();
        assert!(resolver.is_empty());
    }

    #[test]
    fn test_missing_policy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        assert!(load_policies(&path).is_err());
    }

    #[test]
    fn test_malformed_endpoint_is_fatal() {
        let file = write_policy_file(
            ".json",
            r#"{"rateLimitsPerEndpoint": [{"endpoint": "/user/:id", "burst": 1, "sustained": 1}]}"#,
        );

        let err = load_policies(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("malformed endpoint"));
    }

    #[test]
    fn test_negative_quota_is_fatal() {
        let file = write_policy_file(
            ".json",
            r#"{"rateLimitsPerEndpoint": [{"endpoint": "GET /user/:id", "burst": -1, "sustained": 1}]}"#,
        );

        assert!(load_policies(file.path()).is_err());
    }
}
