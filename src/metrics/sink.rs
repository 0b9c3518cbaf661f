//! Write side of the metrics pipeline.

use std::fmt;
use std::time::Duration;

/// Why a delivery attempt (or a whole delivery) failed.
///
/// Rendered as the `reason` label of `request_errors_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureReason {
    /// The HTTP request could not be constructed.
    RequestCreate,
    /// The transport failed to deliver the request.
    RequestDo,
    /// The target answered with a status other than the expected one.
    Response,
    /// Every attempt for a target failed.
    RetriesExhausted,
}

impl FailureReason {
    /// Label value used in exported series.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestCreate => "client_request_create",
            Self::RequestDo => "client_request_do",
            Self::Response => "client_response",
            Self::RetriesExhausted => "retries_exhausted",
        }
    }

    /// Parse a `reason` label value.
    pub fn from_label(label: &str) -> Option<Self> {
        [
            Self::RequestCreate,
            Self::RequestDo,
            Self::Response,
            Self::RetriesExhausted,
        ]
        .into_iter()
        .find(|reason| reason.as_str() == label)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for delivery pipeline metric updates.
///
/// `webhook` is always the redacted display form of a target, never a URL
/// carrying credentials. Implementations must not block for long or fail.
pub trait MetricsSink: Send + Sync {
    /// Count a failure and mark the target's last reload as failed.
    fn record_failure(&self, webhook: &str, reason: FailureReason);

    /// Count a successful reload, store its duration and clear the error gauge.
    fn record_success(&self, webhook: &str, duration: Duration);

    /// Count a response received from a target, keyed by status code.
    fn record_status_code(&self, webhook: &str, status: u16);

    /// Count an error reported by the filesystem watcher.
    fn record_watcher_error(&self);
}
