//! Metrics and observability utilities
//!
//! Counters and histograms for API traffic, report saves and notification
//! polling, all named with a shared prefix. Recording is a no-op until a
//! recorder (e.g. the Prometheus exporter in the server) is installed.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ScoutDeck metrics
pub const METRICS_PREFIX: &str = "scoutdeck";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
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

    describe_counter!(
        format!("{}_report_saves_total", METRICS_PREFIX),
        Unit::Count,
        "Report save attempts by outcome"
    );

    describe_counter!(
        format!("{}_report_conflicts_total", METRICS_PREFIX),
        Unit::Count,
        "Saves rejected because the analyst already has a report for the team"
    );

    describe_counter!(
        format!("{}_token_refreshes_total", METRICS_PREFIX),
        Unit::Count,
        "Access token refresh attempts by outcome"
    );

    describe_counter!(
        format!("{}_notification_polls_total", METRICS_PREFIX),
        Unit::Count,
        "Notification poll cycles by outcome"
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

/// Save outcome label
pub fn record_save(outcome: &str, created: bool) {
    counter!(
        format!("{}_report_saves_total", METRICS_PREFIX),
        "outcome" => outcome.to_string(),
        "kind" => if created { "create" } else { "update" }
    )
    .increment(1);

    if outcome == "conflict" {
        counter!(format!("{}_report_conflicts_total", METRICS_PREFIX)).increment(1);
    }
}

pub fn record_token_refresh(success: bool) {
    counter!(
        format!("{}_token_refreshes_total", METRICS_PREFIX),
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

pub fn record_poll(success: bool) {
    counter!(
        format!("{}_notification_polls_total", METRICS_PREFIX),
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}
