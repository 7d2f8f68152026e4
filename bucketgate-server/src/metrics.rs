//! Simple metrics collection for observability
//!
//! Lightweight atomic counters updated by the rate limiting middleware and
//! exported in Prometheus text format on `GET /metrics`.

use bucketgate::Decision;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Core metrics collected by the server
pub struct Metrics {
    /// Server start time
    start_time: Instant,

    /// Total requests that went through the middleware
    pub total_requests: AtomicU64,

    /// Rate limiting decisions
    pub requests_allowed: AtomicU64,
    pub requests_denied: AtomicU64,
    pub requests_unlimited: AtomicU64,

    /// Decision latency buckets (in microseconds)
    pub latency_under_10us: AtomicU64,
    pub latency_under_100us: AtomicU64,
    pub latency_under_1ms: AtomicU64,
    pub latency_over_1ms: AtomicU64,

    pub latency_sum_micros: AtomicU64,

    /// Buckets held by the registry
    pub active_buckets: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_requests: AtomicU64::new(0),
            requests_allowed: AtomicU64::new(0),
            requests_denied: AtomicU64::new(0),
            requests_unlimited: AtomicU64::new(0),
            latency_under_10us: AtomicU64::new(0),
            latency_under_100us: AtomicU64::new(0),
            latency_under_1ms: AtomicU64::new(0),
            latency_over_1ms: AtomicU64::new(0),
            latency_sum_micros: AtomicU64::new(0),
            active_buckets: AtomicUsize::new(0),
        }
    }

    /// Record a rate limiting decision and how long it took
    pub fn record_decision(&self, decision: &Decision, latency_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        match decision {
            Decision::Allowed { .. } => self.requests_allowed.fetch_add(1, Ordering::Relaxed),
            Decision::Denied { .. } => self.requests_denied.fetch_add(1, Ordering::Relaxed),
            Decision::Unlimited => self.requests_unlimited.fetch_add(1, Ordering::Relaxed),
        };

        match latency_us {
            0..=9 => self.latency_under_10us.fetch_add(1, Ordering::Relaxed),
            10..=99 => self.latency_under_100us.fetch_add(1, Ordering::Relaxed),
            100..=999 => self.latency_under_1ms.fetch_add(1, Ordering::Relaxed),
            _ => self.latency_over_1ms.fetch_add(1, Ordering::Relaxed),
        };

        self.latency_sum_micros
            .fetch_add(latency_us, Ordering::Relaxed);
    }

    pub fn update_active_buckets(&self, count: usize) {
        self.active_buckets.store(count, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(1500);

        let total = self.total_requests.load(Ordering::Relaxed);
        let under_10us = self.latency_under_10us.load(Ordering::Relaxed);
        let under_100us = under_10us + self.latency_under_100us.load(Ordering::Relaxed);
        let under_1ms = under_100us + self.latency_under_1ms.load(Ordering::Relaxed);
        let latency_sum_seconds =
            self.latency_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;

        // Writing into a String cannot fail
        let _ = write!(
            output,
            "# HELP bucketgate_uptime_seconds Time since server start in seconds\n\
             # TYPE bucketgate_uptime_seconds gauge\n\
             bucketgate_uptime_seconds {}\n\n\
             # HELP bucketgate_requests_total Total number of requests checked\n\
             # TYPE bucketgate_requests_total counter\n\
             bucketgate_requests_total {}\n\n\
             # HELP bucketgate_requests_allowed Requests admitted with a token\n\
             # TYPE bucketgate_requests_allowed counter\n\
             bucketgate_requests_allowed {}\n\n\
             # HELP bucketgate_requests_denied Requests rejected for lack of tokens\n\
             # TYPE bucketgate_requests_denied counter\n\
             bucketgate_requests_denied {}\n\n\
             # HELP bucketgate_requests_unlimited Requests to endpoints without a policy\n\
             # TYPE bucketgate_requests_unlimited counter\n\
             bucketgate_requests_unlimited {}\n\n",
            self.uptime_seconds(),
            total,
            self.requests_allowed.load(Ordering::Relaxed),
            self.requests_denied.load(Ordering::Relaxed),
            self.requests_unlimited.load(Ordering::Relaxed),
        );

        let _ = write!(
            output,
            "# HELP bucketgate_decision_duration_seconds Rate limiting decision latency\n\
             # TYPE bucketgate_decision_duration_seconds histogram\n\
             bucketgate_decision_duration_seconds_bucket{{le=\"0.00001\"}} {under_10us}\n\
             bucketgate_decision_duration_seconds_bucket{{le=\"0.0001\"}} {under_100us}\n\
             bucketgate_decision_duration_seconds_bucket{{le=\"0.001\"}} {under_1ms}\n\
             bucketgate_decision_duration_seconds_bucket{{le=\"+Inf\"}} {total}\n\
             bucketgate_decision_duration_seconds_sum {latency_sum_seconds:.6}\n\
             bucketgate_decision_duration_seconds_count {total}\n\n",
        );

        let _ = write!(
            output,
            "# HELP bucketgate_active_buckets Token buckets held in memory\n\
             # TYPE bucketgate_active_buckets gauge\n\
             bucketgate_active_buckets {}\n",
            self.active_buckets.load(Ordering::Relaxed)
        );

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.requests_allowed.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.requests_denied.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.requests_unlimited.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_decision() {
        let metrics = Metrics::new();

        metrics.record_decision(
            &Decision::Allowed {
                remaining: 4,
                limit: 10,
            },
            5,
        );
        metrics.record_decision(&Decision::Denied { limit: 10 }, 50);
        metrics.record_decision(&Decision::Unlimited, 5_000);

        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.requests_allowed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.requests_denied.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.requests_unlimited.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_10us.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_100us.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_over_1ms.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();

        metrics.record_decision(&Decision::Denied { limit: 1 }, 3);
        metrics.record_decision(&Decision::Denied { limit: 1 }, 300);
        metrics.update_active_buckets(7);

        let output = metrics.export_prometheus();

        assert!(output.contains("bucketgate_uptime_seconds"));
        assert!(output.contains("bucketgate_requests_total 2"));
        assert!(output.contains("bucketgate_requests_denied 2"));
        assert!(output.contains("bucketgate_requests_allowed 0"));
        assert!(output.contains("bucketgate_decision_duration_seconds_bucket{le=\"0.00001\"} 1"));
        assert!(output.contains("bucketgate_decision_duration_seconds_bucket{le=\"0.001\"} 2"));
        assert!(output.contains("bucketgate_active_buckets 7"));
    }
}
