//! Prometheus Metrics Definitions
//!
//! Defines all todocache metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Store operation latency buckets (seconds)
const STORE_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Global metrics instance - initialized on first use
pub static METRICS: Lazy<ApiResult<TodoMetrics>> = Lazy::new(TodoMetrics::new);

/// Registered metrics, or `None` if registration failed.
///
/// Registration failure is logged once and metrics are then skipped;
/// request handling never depends on it.
pub fn metrics() -> Option<&'static TodoMetrics> {
    match METRICS.as_ref() {
        Ok(m) => Some(m),
        Err(err) => {
            static WARNED: std::sync::Once = std::sync::Once::new();
            WARNED.call_once(|| tracing::warn!(error = %err, "Metrics disabled"));
            None
        }
    }
}

/// Container for all todocache metrics.
#[derive(Clone)]
pub struct TodoMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Read-path cache lookups - labels: kind (single/collection), outcome (hit/miss)
    pub cache_lookups_total: CounterVec,

    /// Store operation counter - labels: operation, status
    pub store_operations_total: CounterVec,

    /// Store operation duration histogram - labels: operation
    pub store_operation_duration_seconds: HistogramVec,
}

impl TodoMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "todocache_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "todocache_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            cache_lookups_total: register_counter_vec!(
                "todocache_cache_lookups_total",
                "Cache group lookups made by the read path",
                &["kind", "outcome"]
            )
            .map_err(|e| registration_error("cache_lookups_total", e))?,

            store_operations_total: register_counter_vec!(
                "todocache_store_operations_total",
                "Total number of record store operations",
                &["operation", "status"]
            )
            .map_err(|e| registration_error("store_operations_total", e))?,

            store_operation_duration_seconds: register_histogram_vec!(
                "todocache_store_operation_duration_seconds",
                "Record store operation duration in seconds",
                &["operation"],
                STORE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("store_operation_duration_seconds", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record one cache lookup on the read path.
    pub fn record_cache_lookup(&self, kind: &str, hit: bool) {
        let outcome = if hit { "hit" } else { "miss" };
        self.cache_lookups_total
            .with_label_values(&[kind, outcome])
            .inc();
    }

    /// Record a store operation.
    pub fn record_store_operation(&self, operation: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.store_operations_total
            .with_label_values(&[operation, status])
            .inc();
        self.store_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }
}

fn registration_error(name: &str, err: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, err))
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    // Make sure our collectors exist before the first scrape.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_cache_lookup() -> Result<(), String> {
        let m = metrics().ok_or("metrics unavailable")?;
        let before = m
            .cache_lookups_total
            .with_label_values(&["collection", "miss"])
            .get();
        m.record_cache_lookup("collection", false);
        let after = m
            .cache_lookups_total
            .with_label_values(&["collection", "miss"])
            .get();
        assert!(after >= before + 1.0);
        Ok(())
    }

    #[test]
    fn test_record_store_operation() -> Result<(), String> {
        let m = metrics().ok_or("metrics unavailable")?;
        m.record_store_operation("fetch_one", true, 0.005);
        m.record_store_operation("insert", false, 0.010);
        Ok(())
    }
}
