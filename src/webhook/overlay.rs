//! Transport selection between direct dialing and an identity-authenticated
//! overlay network.
//!
//! The overlay itself is not implemented here. An embedding application that
//! can dial through an overlay provides an [`OverlayConnector`];
//! [`select_transport`] only decides, once at startup, whether to use it.

use super::transport::{DirectTransport, Transport};
use crate::error::{ReloadError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Overlay identity loaded from the configured credential file.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityCredential {
    /// Controller API endpoint the identity enrolls against
    #[serde(rename = "ztAPI")]
    pub controller_url: String,
    /// Key material
    pub id: IdentityMaterial,
    #[serde(skip)]
    source: PathBuf,
}

/// Certificate and key for an overlay identity. `Debug` hides the key.
#[derive(Clone, Deserialize)]
pub struct IdentityMaterial {
    /// Client certificate (PEM or `pem:`-prefixed)
    pub cert: String,
    /// Private key
    pub key: String,
    /// CA bundle, if the identity pins one
    #[serde(default)]
    pub ca: Option<String>,
}

impl fmt::Debug for IdentityMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMaterial")
            .field("cert", &format_args!("<{} bytes>", self.cert.len()))
            .field("key", &"<redacted>")
            .field("ca", &self.ca.as_ref().map(|ca| ca.len()))
            .finish()
    }
}

impl IdentityCredential {
    /// Read and parse an identity file.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError::InvalidIdentity`] if the file cannot be read,
    /// is not valid identity JSON, or has an empty controller URL, cert or key.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |reason: String| ReloadError::InvalidIdentity {
            path: path.to_path_buf(),
            reason,
        };

        let contents = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let mut identity: IdentityCredential =
            serde_json::from_str(&contents).map_err(|e| invalid(e.to_string()))?;

        if identity.controller_url.trim().is_empty() {
            return Err(invalid("empty ztAPI".to_string()));
        }
        if identity.id.cert.trim().is_empty() || identity.id.key.trim().is_empty() {
            return Err(invalid("missing cert or key".to_string()));
        }

        identity.source = path.to_path_buf();
        Ok(identity)
    }

    /// File the identity was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// What to dial on the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySettings {
    /// Overlay service name hosting the webhook targets
    pub service: String,
    /// Specific terminating identity to dial, if the service has several
    pub target_identity: Option<String>,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            service: "configmap-reload".to_string(),
            target_identity: None,
        }
    }
}

/// Builds a transport that dials through an identity-authenticated overlay.
pub trait OverlayConnector: Send + Sync {
    /// Build the overlay transport for `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlay context cannot be established.
    fn connect(
        &self,
        identity: &IdentityCredential,
        settings: &OverlaySettings,
    ) -> Result<Arc<dyn Transport>>;
}

/// Pick the transport for this process.
///
/// The overlay is used only when `identity_file` is configured, the file
/// loads, and a connector is available. Every other combination falls back
/// to [`DirectTransport`] with a warning; the only error is failing to build
/// the direct client itself.
pub fn select_transport(
    identity_file: Option<&Path>,
    overlay: &OverlaySettings,
    connector: Option<&dyn OverlayConnector>,
    timeout: Option<Duration>,
) -> Result<Arc<dyn Transport>> {
    let direct = || -> Result<Arc<dyn Transport>> { Ok(Arc::new(DirectTransport::new(timeout)?)) };

    let Some(path) = identity_file else {
        return direct();
    };

    tracing::info!(identity_file = %path.display(), "Loading overlay identity");
    let identity = match IdentityCredential::load(path) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, "Overlay identity unavailable, using direct transport");
            return direct();
        }
    };

    let Some(connector) = connector else {
        tracing::warn!(
            identity_file = %path.display(),
            "Overlay identity found but no overlay connector is available, using direct transport"
        );
        return direct();
    };

    match connector.connect(&identity, overlay) {
        Ok(transport) => {
            tracing::info!(
                service = %overlay.service,
                target_identity = overlay.target_identity.as_deref().unwrap_or(""),
                "Using overlay transport"
            );
            Ok(transport)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Overlay connector failed, using direct transport");
            direct()
        }
    }
}
