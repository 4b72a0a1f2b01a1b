//! Prometheus metrics.
//!
//! [`init_metrics`] installs a global Prometheus recorder and returns a
//! [`MetricsRegistry`] used to render the text exposition format. The
//! `record_*` helpers can be called from anywhere.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

const REQUESTS_TOTAL: &str = "portico_requests_total";
const REQUEST_DURATION: &str = "portico_request_duration_seconds";
const IN_FLIGHT: &str = "portico_in_flight_requests";
const AUTH_REJECTIONS: &str = "portico_auth_rejections_total";
const DOC_REWRITE_FAILURES: &str = "portico_doc_rewrite_failures_total";
const ROUTE_TABLE_RELOADS: &str = "portico_route_table_reloads_total";

/// Request duration buckets, in seconds.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Renders installed metrics.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Renders all metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.run_upkeep();
        self.handle.render()
    }
}

/// Installs the global Prometheus recorder.
///
/// Fails if a recorder is already installed.
pub fn init_metrics() -> TelemetryResult<MetricsRegistry> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), DURATION_BUCKETS)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;

    describe_metrics();
    Ok(MetricsRegistry { handle })
}

fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Requests handled, by route and status");
    describe_histogram!(REQUEST_DURATION, "Request duration in seconds");
    describe_gauge!(IN_FLIGHT, "Requests currently being processed");
    describe_counter!(AUTH_REJECTIONS, "Authentication and authorization rejections");
    describe_counter!(DOC_REWRITE_FAILURES, "API documents served unmodified after a rewrite failure");
    describe_counter!(ROUTE_TABLE_RELOADS, "Route table reload attempts, by outcome");
}

/// Records a completed request.
pub fn record_request(route: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "route" => route.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(REQUEST_DURATION, "route" => route.to_string()).record(duration.as_secs_f64());
}

/// Records an authentication or authorization rejection.
pub fn record_auth_rejection(kind: &'static str, reason: &'static str) {
    counter!(AUTH_REJECTIONS, "kind" => kind, "reason" => reason).increment(1);
}

/// Records a documentation rewrite that fell back to the original body.
pub fn record_doc_rewrite_failure(route: &str) {
    counter!(DOC_REWRITE_FAILURES, "route" => route.to_string()).increment(1);
}

/// Records a route table reload attempt.
pub fn record_route_table_reload(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(ROUTE_TABLE_RELOADS, "outcome" => outcome).increment(1);
}

/// Tracks one in-flight request; the gauge is decremented on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("orders-admin-routes", 200, Duration::from_millis(10));
        record_auth_rejection("authentication", "missing_token");
        record_doc_rewrite_failure("orders-service-api-docs");
        record_route_table_reload(true);
        let guard = InFlightGuard::new();
        drop(guard);
    }

    #[test]
    fn test_buckets_are_sorted() {
        assert!(DURATION_BUCKETS.windows(2).all(|w| w[0] < w[1]));
    }
}
