//! Prometheus metrics exposition
//!
//! - `zapier_requests_total` (counter): labels `route`, `status`
//! - `zapier_request_duration_seconds` (histogram): label `route`
//! - `zapier_upstream_errors_total` (counter): label `kind`

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "zapier_request_duration_seconds";

/// Bucket boundaries from 5ms up to the longest sensible upstream timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
}

/// Install the global Prometheus recorder and return the handle `/metrics` renders.
///
/// The duration metric gets explicit buckets so it renders as a histogram
/// (`_bucket` lines) rather than a summary.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed request by matched route and response status.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "zapier_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(DURATION_METRIC, "route" => route.to_string()).record(duration_secs);
}

/// Record a failed Threads API call (`rejected`, `unavailable`).
pub fn record_upstream_error(kind: &'static str) {
    metrics::counter!("zapier_upstream_errors_total", "kind" => kind).increment(1);
}
