//! Metrics definitions for Pod Chaos Monkey.
//!
//! All metrics follow Prometheus naming conventions:
//! - `chaos_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded by code:
//! - `outcome`: terminated, list, no_candidates, delete
//! - `operation`: list, delete
//! - `status`: success, error, timeout

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and serve `/metrics` on `bind_address`.
///
/// Must be called from within a Tokio runtime, before any metric is recorded.
///
/// # Errors
///
/// Returns error if the recorder is already installed or the listener fails.
pub fn init_metrics_exporter(bind_address: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        // Cluster API calls: kube apiserver round trips, bounded by API_TIMEOUT
        .set_buckets_for_metric(
            Matcher::Prefix("chaos_api_call".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
                30.000,
            ],
        )
        .map_err(|e| format!("Failed to set API call buckets: {e}"))?
        .with_http_listener(bind_address)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))
}

/// Record the outcome of one scheduler tick.
///
/// Metric: `chaos_ticks_total`
/// Labels: `outcome`
pub fn record_tick(outcome: &'static str) {
    counter!("chaos_ticks_total", "outcome" => outcome).increment(1);
}

/// Record an accepted pod deletion.
///
/// Metric: `chaos_pods_terminated_total`
pub fn record_pod_terminated() {
    counter!("chaos_pods_terminated_total").increment(1);
}

/// Set the size of the most recent candidate set.
///
/// Metric: `chaos_candidates`
pub fn set_candidates(count: usize) {
    gauge!("chaos_candidates").set(count as f64);
}

/// Record a failure that could not be queued on the outcome stream.
///
/// Metric: `chaos_outcomes_dropped_total`
pub fn record_outcome_dropped() {
    counter!("chaos_outcomes_dropped_total").increment(1);
}

/// Record latency of a cluster API call.
///
/// Metric: `chaos_api_call_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_api_call(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("chaos_api_call_duration_seconds",
        "operation" => operation,
        "status" => status
    )
    .record(duration.as_secs_f64());
}
