//! Metrics and observability utilities
//!
//! Prometheus-style metric names with a shared prefix. Recording is a no-op
//! until a recorder is installed, so the helpers are safe to call from tests.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Inkwell metrics
pub const METRICS_PREFIX: &str = "inkwell";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Domain metrics
    describe_counter!(
        format!("{}_users_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total users created"
    );

    describe_counter!(
        format!("{}_users_deleted_total", METRICS_PREFIX),
        Unit::Count,
        "Total users deleted, blogs included"
    );

    describe_counter!(
        format!("{}_blogs_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total blogs created"
    );

    describe_counter!(
        format!("{}_blogs_deleted_total", METRICS_PREFIX),
        Unit::Count,
        "Total blogs deleted directly"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Kind of record a write touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    Blog,
}

impl Resource {
    fn plural(self) -> &'static str {
        match self {
            Resource::User => "users",
            Resource::Blog => "blogs",
        }
    }
}

/// Count a created record
pub fn record_created(resource: Resource) {
    counter!(format!("{}_{}_created_total", METRICS_PREFIX, resource.plural())).increment(1);
}

/// Count a deleted record
pub fn record_deleted(resource: Resource) {
    counter!(format!("{}_{}_deleted_total", METRICS_PREFIX, resource.plural())).increment(1);
}
