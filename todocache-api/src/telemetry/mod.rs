//! todocache Telemetry - Observability Infrastructure
//!
//! Structured logging via tracing-subscriber and Prometheus metrics for the
//! API listener, the cache-serving listener and the store adapter.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics, metrics_handler, TodoMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, LogFormat, TelemetryConfig};
