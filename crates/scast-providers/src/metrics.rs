//! Provider metrics.
//!
//! - Request counters by provider, operation and status
//! - Latency histograms
//! - Retry counters

use metrics::{counter, histogram};

/// Metric name constants.
pub mod names {
    /// Total provider requests by provider, operation and status.
    pub const REQUESTS_TOTAL: &str = "scast_provider_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "scast_provider_retries_total";

    /// Request latency in seconds by provider and operation.
    pub const LATENCY_SECONDS: &str = "scast_provider_latency_seconds";
}

/// Record a completed request. `status` is 0 when no response arrived.
pub fn record_request(provider: &str, operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "provider" => provider.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "provider" => provider.to_string(),
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}
