//! Metrics for deployments and the container app.
//!
//! This module provides:
//! - Component and submission counters
//! - Engine submission latency
//! - Output resolution failures
//! - Container app request counts

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

use crate::resources::ResourceKind;

// === Metric Name Constants ===

/// Components created counter metric name.
pub const METRIC_COMPONENTS_CREATED: &str = "components_created_total";
/// Resources submitted counter metric name.
pub const METRIC_RESOURCES_SUBMITTED: &str = "resources_submitted_total";
/// Engine rejections counter metric name.
pub const METRIC_ENGINE_REJECTIONS: &str = "engine_rejections_total";
/// Output resolution failures counter metric name.
pub const METRIC_OUTPUT_FAILURES: &str = "output_resolution_failures_total";
/// Submission latency metric name.
pub const METRIC_SUBMIT_LATENCY: &str = "resource_submit_latency_ms";
/// HTTP requests counter metric name.
pub const METRIC_HTTP_REQUESTS: &str = "http_requests_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_SUBMIT_LATENCY,
        "Time for the engine to accept a resource submission in milliseconds"
    );

    describe_counter!(
        METRIC_COMPONENTS_CREATED,
        "Total number of composite components created"
    );
    describe_counter!(
        METRIC_RESOURCES_SUBMITTED,
        "Total number of child resources accepted by the engine"
    );
    describe_counter!(
        METRIC_ENGINE_REJECTIONS,
        "Total number of submissions refused by the engine"
    );
    describe_counter!(
        METRIC_OUTPUT_FAILURES,
        "Total number of outputs that failed to resolve"
    );
    describe_counter!(
        METRIC_HTTP_REQUESTS,
        "Total number of HTTP requests served by the container app"
    );

    debug!("Metrics initialized");
}

/// Increment components created counter.
pub fn inc_components_created() {
    counter!(METRIC_COMPONENTS_CREATED).increment(1);
}

/// Increment resources submitted counter.
pub fn inc_resources_submitted(kind: ResourceKind) {
    counter!(METRIC_RESOURCES_SUBMITTED, "kind" => kind.to_string()).increment(1);
}

/// Increment engine rejections counter.
pub fn inc_engine_rejections(kind: ResourceKind) {
    counter!(METRIC_ENGINE_REJECTIONS, "kind" => kind.to_string()).increment(1);
}

/// Increment output failures counter.
pub fn inc_output_failures() {
    counter!(METRIC_OUTPUT_FAILURES).increment(1);
}

/// Increment HTTP requests counter.
pub fn inc_http_requests(route: &'static str) {
    counter!(METRIC_HTTP_REQUESTS, "route" => route).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for engine submissions.
pub fn timer_submit() -> LatencyTimer {
    LatencyTimer::new(METRIC_SUBMIT_LATENCY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn latency_timer_measures_time() {
        let timer = LatencyTimer::new("test_metric");
        sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 9.0);
    }
}
