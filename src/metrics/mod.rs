//! Delivery pipeline metrics.
//!
//! The dispatcher and coordinator only ever write through [`MetricsSink`].
//! [`ReloadMetrics`] is the prometheus-backed implementation; exporters read it
//! via [`ReloadMetrics::render`] or [`ReloadMetrics::snapshot`]. Exposed
//! series, all in the `configmap_reload` namespace:
//! - `success_reloads_total{webhook}`
//! - `request_errors_total{webhook,reason}`
//! - `requests_total{webhook,status_code}`
//! - `watcher_errors_total`
//! - `last_reload_error{webhook}`
//! - `last_request_duration_seconds{webhook}`
//!
//! [`MetricsServer`] serves the same series over HTTP in the Prometheus text
//! format.
//!
//! With the `metrics` feature enabled, every update is also mirrored into
//! OpenTelemetry instruments.
//!
//! # Examples
//!
//! ```rust
//! use configmap_reload::metrics::{FailureReason, MetricsSink, ReloadMetrics};
//! use std::time::Duration;
//!
//! let metrics = ReloadMetrics::new().unwrap();
//! metrics.record_status_code("http://localhost:9090/-/reload", 200);
//! metrics.record_success("http://localhost:9090/-/reload", Duration::from_millis(12));
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.success_reloads("http://localhost:9090/-/reload"), 1);
//! assert_eq!(snapshot.last_reload_error("http://localhost:9090/-/reload"), Some(0.0));
//! # let _ = FailureReason::RetriesExhausted;
//! ```

#[cfg(feature = "metrics")]
mod otel;
mod reload_metrics;
mod server;
mod sink;

pub use reload_metrics::{MetricsSnapshot, ReloadMetrics};
pub use server::MetricsServer;
pub use sink::{FailureReason, MetricsSink};

/// Namespace prefix shared by every exported series.
pub const NAMESPACE: &str = "configmap_reload";
