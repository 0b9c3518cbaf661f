//! # configmap-reload
//!
//! Watches mounted Kubernetes ConfigMap volumes and calls reload webhooks
//! when their contents change.
//!
//! ## Overview
//!
//! The kubelet updates a ConfigMap volume by writing a fresh timestamped
//! directory and atomically repointing the `..data` symlink at it. A reload is
//! triggered only by that final swap, so a single update yields a single
//! notification no matter how many files changed.
//!
//! On every update each configured webhook is called in order, with a bounded
//! number of attempts and a fixed backoff between failures. Outcomes are
//! recorded as Prometheus metrics labelled by webhook URL (credentials
//! stripped) and can be served over HTTP with [`metrics::MetricsServer`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use configmap_reload::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! // CONFIGMAP_RELOAD_VOLUME_DIRS=/etc/config
//! // CONFIGMAP_RELOAD_WEBHOOK_URLS=http://localhost:9090/-/reload
//! let settings = SettingsLoader::new()
//!     .with_env_overrides("CONFIGMAP_RELOAD", "__")
//!     .load()?;
//!
//! let (trigger, shutdown) = configmap_reload::shutdown::channel();
//! let reloader = Reloader::builder().with_settings(settings).build()?;
//!
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     trigger.trigger();
//! });
//! reloader.run(shutdown).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `metrics`: mirror every recorded outcome into OpenTelemetry instruments

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod shutdown;
pub mod webhook;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{ReloadSettings, Reloader, ReloaderBuilder, SettingsLoader};
    pub use crate::error::{ReloadError, Result};
    pub use crate::metrics::{MetricsServer, MetricsSink, ReloadMetrics};
    pub use crate::shutdown::Shutdown;
    pub use crate::webhook::{Transport, WebhookTarget};
}
