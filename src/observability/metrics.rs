//! Metrics collection and exposition.
//!
//! # Metrics
//! - `digit_relay_requests_total` (counter): requests by route
//! - `digit_relay_inference_total` (counter): predictions by outcome
//! - `digit_relay_inference_duration_seconds` (histogram): decode + classify latency
//! - `digit_relay_forward_total` (counter): peer notifications by outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

use crate::http::request::Route;
use crate::inference::InferenceResult;
use crate::relay::ForwardOutcome;

pub const REQUESTS_TOTAL: &str = "digit_relay_requests_total";
pub const INFERENCE_TOTAL: &str = "digit_relay_inference_total";
pub const INFERENCE_DURATION: &str = "digit_relay_inference_duration_seconds";
pub const FORWARD_TOTAL: &str = "digit_relay_forward_total";

/// Buckets sized for sub-millisecond to tens-of-milliseconds inference.
const INFERENCE_BUCKETS: &[f64] = &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5];

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Full(INFERENCE_DURATION.to_string()), INFERENCE_BUCKETS)?
        .install()?;

    ::metrics::describe_counter!(REQUESTS_TOTAL, "Requests handled, by route");
    ::metrics::describe_counter!(INFERENCE_TOTAL, "Predictions attempted, by outcome");
    ::metrics::describe_histogram!(INFERENCE_DURATION, "Decode and classify latency");
    ::metrics::describe_counter!(FORWARD_TOTAL, "Peer notifications, by outcome");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(route: Route) {
    ::metrics::counter!(REQUESTS_TOTAL, "route" => route.as_str()).increment(1);
}

pub fn record_inference(result: &InferenceResult, started: Instant) {
    let outcome = if result.success { "success" } else { "failure" };
    ::metrics::counter!(INFERENCE_TOTAL, "outcome" => outcome).increment(1);
    ::metrics::histogram!(INFERENCE_DURATION).record(started.elapsed().as_secs_f64());
}

pub fn record_forward(outcome: ForwardOutcome) {
    ::metrics::counter!(FORWARD_TOTAL, "outcome" => outcome.as_str()).increment(1);
}
