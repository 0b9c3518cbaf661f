//! Prometheus-backed metrics state with a read-only snapshot for tests and
//! embedders.

use super::NAMESPACE;
use super::sink::{FailureReason, MetricsSink};
use crate::error::{ReloadError, Result};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::collections::BTreeMap;
use std::time::Duration;

#[cfg(feature = "metrics")]
use super::otel::OtelInstruments;

/// Metrics collector for the reload delivery pipeline.
///
/// Every series lives in a private [`Registry`] under the `configmap_reload`
/// namespace. [`render`](Self::render) produces the Prometheus text format;
/// [`snapshot`](Self::snapshot) gathers the same data into plain maps.
///
/// # Examples
///
/// ```rust
/// use configmap_reload::metrics::{FailureReason, MetricsSink, ReloadMetrics};
///
/// let metrics = ReloadMetrics::new().unwrap();
/// metrics.record_failure("http://app:8080/reload", FailureReason::RequestDo);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.request_errors("http://app:8080/reload", FailureReason::RequestDo), 1);
/// assert_eq!(snapshot.last_reload_error("http://app:8080/reload"), Some(1.0));
/// assert!(metrics.render().unwrap().contains("configmap_reload_request_errors_total"));
/// ```
pub struct ReloadMetrics {
    registry: Registry,
    success_reloads: IntCounterVec,
    request_errors: IntCounterVec,
    requests: IntCounterVec,
    watcher_errors: IntCounter,
    last_reload_error: GaugeVec,
    last_request_duration: GaugeVec,
    #[cfg(feature = "metrics")]
    otel: Option<OtelInstruments>,
}

fn opts(name: &str, help: &str) -> Opts {
    Opts::new(name, help).namespace(NAMESPACE)
}

fn registration(e: prometheus::Error) -> ReloadError {
    ReloadError::Metrics(format!("Failed to register metric: {}", e))
}

impl ReloadMetrics {
    /// Create a collector with every series registered and empty.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError::Metrics`] if a series cannot be registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let success_reloads = IntCounterVec::new(
            opts("success_reloads_total", "Total success reload calls"),
            &["webhook"],
        )
        .map_err(registration)?;
        registry
            .register(Box::new(success_reloads.clone()))
            .map_err(registration)?;

        let request_errors = IntCounterVec::new(
            opts("request_errors_total", "Total request errors"),
            &["webhook", "reason"],
        )
        .map_err(registration)?;
        registry
            .register(Box::new(request_errors.clone()))
            .map_err(registration)?;

        let requests = IntCounterVec::new(
            opts("requests_total", "Total requests"),
            &["webhook", "status_code"],
        )
        .map_err(registration)?;
        registry
            .register(Box::new(requests.clone()))
            .map_err(registration)?;

        let watcher_errors = IntCounter::with_opts(opts(
            "watcher_errors_total",
            "Total filesystem watcher errors",
        ))
        .map_err(registration)?;
        registry
            .register(Box::new(watcher_errors.clone()))
            .map_err(registration)?;

        let last_reload_error = GaugeVec::new(
            opts(
                "last_reload_error",
                "Whether the last reload resulted in an error (1 for error, 0 for success)",
            ),
            &["webhook"],
        )
        .map_err(registration)?;
        registry
            .register(Box::new(last_reload_error.clone()))
            .map_err(registration)?;

        let last_request_duration = GaugeVec::new(
            opts(
                "last_request_duration_seconds",
                "Duration of last webhook request",
            ),
            &["webhook"],
        )
        .map_err(registration)?;
        registry
            .register(Box::new(last_request_duration.clone()))
            .map_err(registration)?;

        Ok(Self {
            registry,
            success_reloads,
            request_errors,
            requests,
            watcher_errors,
            last_reload_error,
            last_request_duration,
            #[cfg(feature = "metrics")]
            otel: None,
        })
    }

    /// Create a collector that also mirrors every update into OpenTelemetry
    /// instruments built from `meter`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use configmap_reload::metrics::ReloadMetrics;
    /// use opentelemetry::global;
    ///
    /// let metrics = ReloadMetrics::with_meter(global::meter("configmap-reload")).unwrap();
    /// ```
    #[cfg(feature = "metrics")]
    pub fn with_meter(meter: opentelemetry::metrics::Meter) -> Result<Self> {
        Ok(Self {
            otel: Some(OtelInstruments::new(&meter)),
            ..Self::new()?
        })
    }

    /// Registry holding every series, for embedders with their own exporter.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every series in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .map_err(|e| ReloadError::Metrics(format!("Failed to encode metrics: {}", e)))
    }

    /// Gather every series into a [`MetricsSnapshot`].
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();
        for family in self.registry.gather() {
            snapshot.absorb(&family);
        }
        snapshot
    }
}

impl MetricsSink for ReloadMetrics {
    fn record_failure(&self, webhook: &str, reason: FailureReason) {
        self.request_errors
            .with_label_values(&[webhook, reason.as_str()])
            .inc();
        self.last_reload_error.with_label_values(&[webhook]).set(1.0);

        #[cfg(feature = "metrics")]
        if let Some(otel) = &self.otel {
            otel.record_failure(webhook, reason);
        }
    }

    fn record_success(&self, webhook: &str, duration: Duration) {
        let seconds = duration.as_secs_f64();
        self.last_request_duration
            .with_label_values(&[webhook])
            .set(seconds);
        self.success_reloads.with_label_values(&[webhook]).inc();
        self.last_reload_error.with_label_values(&[webhook]).set(0.0);

        #[cfg(feature = "metrics")]
        if let Some(otel) = &self.otel {
            otel.record_success(webhook, seconds);
        }
    }

    fn record_status_code(&self, webhook: &str, status: u16) {
        let status_code = status.to_string();
        self.requests
            .with_label_values(&[webhook, status_code.as_str()])
            .inc();

        #[cfg(feature = "metrics")]
        if let Some(otel) = &self.otel {
            otel.record_status_code(webhook, status);
        }
    }

    fn record_watcher_error(&self) {
        self.watcher_errors.inc();

        #[cfg(feature = "metrics")]
        if let Some(otel) = &self.otel {
            otel.record_watcher_error();
        }
    }
}

/// Point-in-time copy of [`ReloadMetrics`].
///
/// Lookups for series that were never written return `0` for counters and
/// `None` for gauges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// `success_reloads_total` by webhook
    pub success_reloads: BTreeMap<String, u64>,
    /// `request_errors_total` by webhook and reason
    pub request_errors: BTreeMap<(String, FailureReason), u64>,
    /// `requests_total` by webhook and status code
    pub requests: BTreeMap<(String, u16), u64>,
    /// `last_reload_error` by webhook (0 or 1)
    pub last_reload_error: BTreeMap<String, f64>,
    /// `last_request_duration_seconds` by webhook
    pub last_request_duration_seconds: BTreeMap<String, f64>,
    /// `watcher_errors_total`
    pub watcher_errors: u64,
}

impl MetricsSnapshot {
    fn absorb(&mut self, family: &MetricFamily) {
        let prefix = format!("{}_", NAMESPACE);
        let Some(name) = family.name().strip_prefix(prefix.as_str()) else {
            return;
        };

        for metric in &family.metric {
            let label = |key: &str| {
                metric
                    .label
                    .iter()
                    .find(|pair| pair.name() == key)
                    .map(|pair| pair.value().to_string())
                    .unwrap_or_default()
            };
            let count = metric.counter.value() as u64;
            let gauge = metric.gauge.value();

            match name {
                "success_reloads_total" => {
                    self.success_reloads.insert(label("webhook"), count);
                }
                "request_errors_total" => {
                    if let Some(reason) = FailureReason::from_label(&label("reason")) {
                        self.request_errors.insert((label("webhook"), reason), count);
                    }
                }
                "requests_total" => {
                    if let Ok(status) = label("status_code").parse() {
                        self.requests.insert((label("webhook"), status), count);
                    }
                }
                "watcher_errors_total" => self.watcher_errors = count,
                "last_reload_error" => {
                    self.last_reload_error.insert(label("webhook"), gauge);
                }
                "last_request_duration_seconds" => {
                    self.last_request_duration_seconds
                        .insert(label("webhook"), gauge);
                }
                _ => {}
            }
        }
    }

    /// Successful reloads delivered to `webhook`.
    pub fn success_reloads(&self, webhook: &str) -> u64 {
        self.success_reloads.get(webhook).copied().unwrap_or(0)
    }

    /// Failures recorded for `webhook` with the given reason.
    pub fn request_errors(&self, webhook: &str, reason: FailureReason) -> u64 {
        self.request_errors
            .get(&(webhook.to_string(), reason))
            .copied()
            .unwrap_or(0)
    }

    /// Responses received from `webhook` with the given status code.
    pub fn requests(&self, webhook: &str, status: u16) -> u64 {
        self.requests
            .get(&(webhook.to_string(), status))
            .copied()
            .unwrap_or(0)
    }

    /// Total responses received from `webhook`, any status.
    pub fn total_requests(&self, webhook: &str) -> u64 {
        self.requests
            .iter()
            .filter(|((hook, _), _)| hook == webhook)
            .map(|(_, count)| count)
            .sum()
    }

    /// Error gauge for `webhook`: `1.0` after a failure, `0.0` after a success.
    pub fn last_reload_error(&self, webhook: &str) -> Option<f64> {
        self.last_reload_error.get(webhook).copied()
    }

    /// Duration of the last successful request to `webhook`, in seconds.
    pub fn last_request_duration_seconds(&self, webhook: &str) -> Option<f64> {
        self.last_request_duration_seconds.get(webhook).copied()
    }

    /// Whether nothing at all has been recorded.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
