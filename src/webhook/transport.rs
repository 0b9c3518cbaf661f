//! HTTP transport used to deliver webhook requests.

use async_trait::async_trait;
use crate::error::{ReloadError, Result};
use reqwest::{Client, Request, StatusCode};
use std::time::Duration;

/// A request could not be delivered (dial, connect, TLS, timeout).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    /// Create a transport error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // Target URLs never carry userinfo, so the message is safe to log.
        Self::new(err.to_string())
    }
}

/// Performs a single HTTP request.
///
/// The dispatcher only needs the response status; implementations must
/// consume or drop the body themselves. Selected once at startup, see
/// [`select_transport`](super::select_transport).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response status.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response was received.
    async fn execute(&self, request: Request) -> std::result::Result<StatusCode, TransportError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "direct"
    }
}

/// Transport dialing targets directly over TCP/TLS with `reqwest`.
///
/// # Examples
///
/// ```rust,no_run
/// use configmap_reload::webhook::{DirectTransport, Transport};
/// use reqwest::{Method, Request};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = DirectTransport::new(None)?;
/// let request = Request::new(Method::POST, "http://localhost:9090/-/reload".parse()?);
/// let status = transport.execute(request).await?;
/// println!("reload answered {}", status);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DirectTransport {
    client: Client,
}

impl DirectTransport {
    /// Create a direct transport, optionally bounding each request by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| {
            ReloadError::TransportSetup(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for DirectTransport {
    async fn execute(&self, request: Request) -> std::result::Result<StatusCode, TransportError> {
        let response = self.client.execute(request).await?;
        Ok(response.status())
    }
}
