//! OpenTelemetry mirror of the reload metrics.

use super::NAMESPACE;
use super::sink::FailureReason;
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Meter};

/// Instruments mirroring [`ReloadMetrics`](super::ReloadMetrics) updates.
pub(crate) struct OtelInstruments {
    success_reloads: Counter<u64>,
    request_errors: Counter<u64>,
    requests: Counter<u64>,
    watcher_errors: Counter<u64>,
    last_reload_error: Gauge<f64>,
    last_request_duration: Gauge<f64>,
}

fn name(metric: &str) -> String {
    format!("{NAMESPACE}.{metric}")
}

impl OtelInstruments {
    pub(crate) fn new(meter: &Meter) -> Self {
        let success_reloads = meter
            .u64_counter(name("success_reloads_total"))
            .with_description("Total success reload calls")
            .build();

        let request_errors = meter
            .u64_counter(name("request_errors_total"))
            .with_description("Total request errors by reason")
            .build();

        let requests = meter
            .u64_counter(name("requests_total"))
            .with_description("Total requests by response status code")
            .build();

        let watcher_errors = meter
            .u64_counter(name("watcher_errors_total"))
            .with_description("Total filesystem watcher errors")
            .build();

        let last_reload_error = meter
            .f64_gauge(name("last_reload_error"))
            .with_description("Whether the last reload resulted in an error (1 for error, 0 for success)")
            .build();

        let last_request_duration = meter
            .f64_gauge(name("last_request_duration_seconds"))
            .with_description("Duration of last webhook request")
            .with_unit("s")
            .build();

        Self {
            success_reloads,
            request_errors,
            requests,
            watcher_errors,
            last_reload_error,
            last_request_duration,
        }
    }

    pub(crate) fn record_failure(&self, webhook: &str, reason: FailureReason) {
        let hook = KeyValue::new("webhook", webhook.to_string());
        self.request_errors.add(
            1,
            &[hook.clone(), KeyValue::new("reason", reason.as_str())],
        );
        self.last_reload_error.record(1.0, &[hook]);
    }

    pub(crate) fn record_success(&self, webhook: &str, seconds: f64) {
        let attrs = [KeyValue::new("webhook", webhook.to_string())];
        self.last_request_duration.record(seconds, &attrs);
        self.success_reloads.add(1, &attrs);
        self.last_reload_error.record(0.0, &attrs);
    }

    pub(crate) fn record_status_code(&self, webhook: &str, status: u16) {
        self.requests.add(
            1,
            &[
                KeyValue::new("webhook", webhook.to_string()),
                KeyValue::new("status_code", status.to_string()),
            ],
        );
    }

    pub(crate) fn record_watcher_error(&self) {
        self.watcher_errors.add(1, &[]);
    }
}
