//! Metrics definitions for the Chat Gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gateway_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP methods
//! - `endpoint`: the handful of known routes, everything else is `/other`
//! - `status`: 3 values (success, error, timeout)
//! - `outcome` / `result`: fixed sets defined by the recording functions
//! - `error_type`: bounded by `AuthError::kind`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle for `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_http_request".to_string()),
            &[
                0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_jwks_fetch".to_string()),
            &[0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `gateway_http_requests_total`, `gateway_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gateway_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gateway_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/authorize" => "/authorize",
        "/chat" => "/chat",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Authorization Metrics
// ============================================================================

/// Record an authorization decision.
///
/// Metric: `gateway_authorizations_total`
/// Labels: `outcome` (allow, deny), `error_type` (`none` or an `AuthError` kind)
pub fn record_authorization(error_type: Option<&'static str>) {
    let outcome = if error_type.is_some() { "deny" } else { "allow" };

    counter!("gateway_authorizations_total",
        "outcome" => outcome,
        "error_type" => error_type.unwrap_or("none")
    )
    .increment(1);
}

/// Result of a key set lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySetLookup {
    /// Served from a fresh cache entry.
    Hit,
    /// Fetched from the provider.
    Fetched,
    /// Fetch failed, stale entry served.
    Stale,
    /// Fetch failed, nothing cached.
    Unavailable,
}

impl KeySetLookup {
    fn as_str(self) -> &'static str {
        match self {
            KeySetLookup::Hit => "hit",
            KeySetLookup::Fetched => "fetched",
            KeySetLookup::Stale => "stale",
            KeySetLookup::Unavailable => "unavailable",
        }
    }
}

/// Record a key set lookup.
///
/// Metric: `gateway_jwks_requests_total`
/// Labels: `result`
pub fn record_jwks_lookup(result: KeySetLookup) {
    counter!("gateway_jwks_requests_total", "result" => result.as_str()).increment(1);
}

/// Record one key set fetch against the provider.
///
/// Metric: `gateway_jwks_fetch_duration_seconds`
/// Labels: `status` (success, error)
pub fn record_jwks_fetch(success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };

    histogram!("gateway_jwks_fetch_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
}

// ============================================================================
// Aggregation Metrics
// ============================================================================

/// How an aggregation pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationOutcome {
    /// Text accumulated and returned.
    Complete,
    /// Clean pass with no usable text.
    Empty,
    /// Decoding failure mid-stream.
    Aborted,
}

/// Record an aggregation pass.
///
/// Metric: `gateway_aggregations_total`
/// Labels: `outcome`
pub fn record_aggregation(outcome: AggregationOutcome) {
    let outcome = match outcome {
        AggregationOutcome::Complete => "complete",
        AggregationOutcome::Empty => "empty",
        AggregationOutcome::Aborted => "aborted",
    };

    counter!("gateway_aggregations_total", "outcome" => outcome).increment(1);
}
