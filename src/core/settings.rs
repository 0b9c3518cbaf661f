//! Startup settings.

use crate::error::{ReloadError, Result};
use crate::webhook::{DEFAULT_BACKOFF, DeliveryPolicy, OverlaySettings, WebhookTarget};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default address of the metrics endpoint.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9533";

/// Default path of the Prometheus exposition.
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";

/// Everything the reloader needs at startup.
///
/// Deserialized by [`SettingsLoader`](super::SettingsLoader); every field has
/// a default, but [`validate`](Self::validate) rejects settings without
/// directories or webhook URLs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReloadSettings {
    /// ConfigMap volume directories to watch
    pub volume_dirs: Vec<PathBuf>,
    /// Webhook URLs notified on every update, in order
    pub webhook_urls: Vec<String>,
    /// HTTP method of the reload request
    pub webhook_method: String,
    /// Status code indicating a successful reload
    pub webhook_status_code: u16,
    /// Attempts per webhook and update
    pub webhook_retries: u32,
    /// Seconds to wait after a failed attempt
    pub webhook_backoff_secs: u64,
    /// Per-request timeout in seconds; unbounded when unset
    pub webhook_timeout_secs: Option<u64>,
    /// Overlay identity credential; enables the overlay transport when it loads
    pub identity_file: Option<PathBuf>,
    /// Overlay service to dial
    pub overlay_service: String,
    /// Overlay identity terminating the service
    pub overlay_target_identity: Option<String>,
    /// Address the metrics endpoint listens on
    pub web_listen_address: String,
    /// Path serving the Prometheus exposition
    pub web_telemetry_path: String,
}

impl Default for ReloadSettings {
    fn default() -> Self {
        let overlay = OverlaySettings::default();
        Self {
            volume_dirs: Vec::new(),
            webhook_urls: Vec::new(),
            webhook_method: Method::POST.to_string(),
            webhook_status_code: StatusCode::OK.as_u16(),
            webhook_retries: 1,
            webhook_backoff_secs: DEFAULT_BACKOFF.as_secs(),
            webhook_timeout_secs: None,
            identity_file: None,
            overlay_service: overlay.service,
            overlay_target_identity: overlay.target_identity,
            web_listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            web_telemetry_path: DEFAULT_TELEMETRY_PATH.to_string(),
        }
    }
}

impl ReloadSettings {
    /// Check everything that would make startup fail.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError::InvalidSettings`] for a missing directory or
    /// webhook list, an invalid method, status code or telemetry path, or zero
    /// retries, and [`ReloadError::InvalidWebhookUrl`] for the first
    /// unparsable URL.
    pub fn validate(&self) -> Result<()> {
        if self.volume_dirs.is_empty() {
            return Err(ReloadError::invalid_settings("Missing volume-dir"));
        }
        if self.webhook_urls.is_empty() {
            return Err(ReloadError::invalid_settings("Missing webhook-url"));
        }
        if !self.web_telemetry_path.starts_with('/') || self.web_telemetry_path == "/" {
            return Err(ReloadError::invalid_settings(format!(
                "Invalid web-telemetry-path {:?}",
                self.web_telemetry_path
            )));
        }
        self.delivery_policy()?;
        self.webhook_targets()?;
        Ok(())
    }

    /// Parse every webhook URL, in order.
    pub fn webhook_targets(&self) -> Result<Vec<WebhookTarget>> {
        self.webhook_urls
            .iter()
            .map(|url| WebhookTarget::parse(url))
            .collect()
    }

    /// Delivery policy derived from the webhook settings.
    pub fn delivery_policy(&self) -> Result<DeliveryPolicy> {
        let method = Method::from_bytes(self.webhook_method.as_bytes()).map_err(|_| {
            ReloadError::invalid_settings(format!(
                "Invalid webhook-method {:?}",
                self.webhook_method
            ))
        })?;

        let expected_status = StatusCode::from_u16(self.webhook_status_code).map_err(|_| {
            ReloadError::invalid_settings(format!(
                "Invalid webhook-status-code {}",
                self.webhook_status_code
            ))
        })?;

        if self.webhook_retries == 0 {
            return Err(ReloadError::invalid_settings(
                "webhook-retries must be at least 1",
            ));
        }

        Ok(DeliveryPolicy {
            method,
            expected_status,
            retries: self.webhook_retries,
            backoff: Duration::from_secs(self.webhook_backoff_secs),
        })
    }

    /// Overlay dial settings.
    pub fn overlay(&self) -> OverlaySettings {
        OverlaySettings {
            service: self.overlay_service.clone(),
            target_identity: self
                .overlay_target_identity
                .clone()
                .filter(|identity| !identity.is_empty()),
        }
    }

    /// Per-request timeout for the direct transport.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.webhook_timeout_secs.map(Duration::from_secs)
    }
}

// Webhook URLs may carry passwords.
impl fmt::Debug for ReloadSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let webhook_urls: Vec<String> = self
            .webhook_urls
            .iter()
            .map(|url| crate::webhook::redact_userinfo(url))
            .collect();

        f.debug_struct("ReloadSettings")
            .field("volume_dirs", &self.volume_dirs)
            .field("webhook_urls", &webhook_urls)
            .field("webhook_method", &self.webhook_method)
            .field("webhook_status_code", &self.webhook_status_code)
            .field("webhook_retries", &self.webhook_retries)
            .field("webhook_backoff_secs", &self.webhook_backoff_secs)
            .field("webhook_timeout_secs", &self.webhook_timeout_secs)
            .field("identity_file", &self.identity_file)
            .field("overlay_service", &self.overlay_service)
            .field("overlay_target_identity", &self.overlay_target_identity)
            .field("web_listen_address", &self.web_listen_address)
            .field("web_telemetry_path", &self.web_telemetry_path)
            .finish()
    }
}
