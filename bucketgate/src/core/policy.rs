//! Per-endpoint quota policies and their lookup
//!
//! A policy binds an endpoint, written `"<METHOD> <path>"`, to a burst
//! capacity and a sustained rate per minute. The [`PolicyResolver`] holds the
//! loaded policies in their configured order and answers which one applies to
//! a given method and path pattern.

use super::PolicyError;

/// Quota attached to a single endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPolicy {
    endpoint: String,
    split: usize,
    burst: u64,
    sustained_per_minute: u64,
}

impl EndpointPolicy {
    /// Build a policy from a method and a path pattern
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::MalformedEndpoint`] if either part is empty or
    /// contains whitespace.
    pub fn new(
        method: &str,
        path: &str,
        burst: u64,
        sustained_per_minute: u64,
    ) -> Result<Self, PolicyError> {
        Self::parse(&format!("{method} {path}"), burst, sustained_per_minute)
    }

    /// Build a policy from an endpoint string such as `"GET /user/:id"`
    ///
    /// # Example
    ///
    /// ```
    /// use bucketgate::EndpointPolicy;
    ///
    /// let policy = EndpointPolicy::parse("PATCH /user/:id", 10, 6).unwrap();
    /// assert_eq!(policy.method(), "PATCH");
    /// assert_eq!(policy.path(), "/user/:id");
    ///
    /// assert!(EndpointPolicy::parse("/user/:id", 10, 6).is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::MalformedEndpoint`] unless the string is exactly
    /// two non-empty parts separated by a single space.
    pub fn parse(
        endpoint: &str,
        burst: u64,
        sustained_per_minute: u64,
    ) -> Result<Self, PolicyError> {
        let mut parts = endpoint.split(' ');
        let (Some(method), Some(path), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(PolicyError::MalformedEndpoint(endpoint.to_string()));
        };
        if method.is_empty()
            || path.is_empty()
            || endpoint.chars().any(|c| c.is_whitespace() && c != ' ')
        {
            return Err(PolicyError::MalformedEndpoint(endpoint.to_string()));
        }

        Ok(EndpointPolicy {
            endpoint: endpoint.to_string(),
            split: method.len(),
            burst,
            sustained_per_minute,
        })
    }

    /// The endpoint as configured, `"<METHOD> <path>"`
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &str {
        &self.endpoint[..self.split]
    }

    pub fn path(&self) -> &str {
        &self.endpoint[self.split + 1..]
    }

    /// Bucket capacity
    pub fn burst(&self) -> u64 {
        self.burst
    }

    /// Refill rate in tokens per minute
    pub fn sustained_per_minute(&self) -> u64 {
        self.sustained_per_minute
    }

    fn matches(&self, method: &str, path: &str) -> bool {
        self.method() == method && self.path() == path
    }
}

/// Ordered, read-only list of endpoint policies
///
/// Lookups scan the list and the first exact match wins. Duplicate entries
/// for one endpoint are tolerated; only the first is ever used.
#[derive(Debug, Clone, Default)]
pub struct PolicyResolver {
    policies: Vec<EndpointPolicy>,
}

impl PolicyResolver {
    pub fn new(policies: Vec<EndpointPolicy>) -> Self {
        PolicyResolver { policies }
    }

    /// Find the policy for `method` and `path`
    ///
    /// `None` means the endpoint is unlimited.
    ///
    /// # Example
    ///
    /// ```
    /// use bucketgate::{EndpointPolicy, PolicyResolver};
    ///
    /// let resolver = PolicyResolver::new(vec![
    ///     EndpointPolicy::parse("GET /user/:id", 10, 6).unwrap(),
    /// ]);
    ///
    /// assert!(resolver.resolve("GET", "/user/:id").is_some());
    /// assert!(resolver.resolve("DELETE", "/user/:id").is_none());
    /// ```
    pub fn resolve(&self, method: &str, path: &str) -> Option<&EndpointPolicy> {
        self.policies.iter().find(|p| p.matches(method, path))
    }

    pub fn policies(&self) -> &[EndpointPolicy] {
        &self.policies
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl FromIterator<EndpointPolicy> for PolicyResolver {
    fn from_iter<I: IntoIterator<Item = EndpointPolicy>>(iter: I) -> Self {
        PolicyResolver::new(iter.into_iter().collect())
    }
}
