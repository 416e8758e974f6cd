//! Prometheus metrics.
//!
//! The recorder is process-global; [`init`] installs it on first call and
//! hands every later caller the same render handle.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                warn!("A metrics recorder was already installed, /metrics will be empty");
            }
            handle
        })
        .clone()
}

pub fn record_request(endpoint: &'static str, status: u16) {
    counter!(
        "tubeproxy_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("tubeproxy_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

/// `outcome` is one of hit, stale, upstream, reconstructed, empty.
pub fn record_cache_outcome(operation: &'static str, outcome: &'static str) {
    counter!(
        "tubeproxy_cache_outcomes_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_upstream_error(operation: &'static str) {
    counter!("tubeproxy_upstream_errors_total", "operation" => operation).increment(1);
}
