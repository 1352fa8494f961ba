//! statsgate telemetry - Prometheus exposition
//!
//! Provides:
//! - `MetricsRegistry`: gauges mirroring the request meter, the response
//!   cache and the governed pipeline, encoded in the text exposition format

pub mod metrics;

pub use metrics::MetricsRegistry;
