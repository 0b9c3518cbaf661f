//! Error types for configmap-reload.

use std::path::PathBuf;

/// Result type alias for configmap-reload operations.
pub type Result<T> = std::result::Result<T, ReloadError>;

/// Errors raised while assembling or starting the reloader.
///
/// Everything in here is startup-fatal or belongs to the identity credential
/// lookup. Failures during delivery are reported as [`DeliveryOutcome`] values
/// and metric updates instead.
///
/// [`DeliveryOutcome`]: crate::webhook::DeliveryOutcome
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    /// Failed to load settings from a source.
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    /// Failed to deserialize settings.
    #[error("Failed to deserialize settings: {0}")]
    DeserializationError(String),

    /// Settings were loaded but are not usable.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// A webhook URL could not be parsed.
    #[error("Invalid webhook URL {url:?}: {reason}")]
    InvalidWebhookUrl {
        /// The offending URL with any credentials removed
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The underlying watcher could not be created.
    #[error("File watching error: {0}")]
    WatchError(String),

    /// A directory could not be registered with the watcher.
    #[error("Failed to watch directory {}: {reason}", path.display())]
    WatchRegistration {
        /// Directory that could not be watched
        path: PathBuf,
        /// Reason reported by the watcher backend
        reason: String,
    },

    /// The overlay identity credential could not be read or parsed.
    #[error("Invalid identity credential {}: {reason}", path.display())]
    InvalidIdentity {
        /// Configured credential path
        path: PathBuf,
        /// Why the credential was rejected
        reason: String,
    },

    /// Metrics could not be registered, encoded or served.
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// The transport could not be constructed.
    #[error("Transport error: {0}")]
    TransportSetup(String),
}

impl ReloadError {
    /// Create an invalid settings error.
    pub fn invalid_settings(msg: impl Into<String>) -> Self {
        Self::InvalidSettings(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_registration_message() {
        let err = ReloadError::WatchRegistration {
            path: PathBuf::from("/etc/config"),
            reason: "No such file or directory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to watch directory /etc/config: No such file or directory"
        );
    }

    #[test]
    fn test_invalid_settings_helper() {
        let err = ReloadError::invalid_settings("missing volume-dir");
        assert!(matches!(err, ReloadError::InvalidSettings(ref m) if m == "missing volume-dir"));
    }
}
