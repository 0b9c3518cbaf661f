//! Builder for assembling a [`Reloader`].

use crate::core::{LoopSummary, ReloadCoordinator, ReloadSettings};
use crate::error::Result;
use crate::metrics::{MetricsSink, ReloadMetrics};
use crate::notify::{DirectoryWatcher, WatchStreams};
use crate::shutdown::Shutdown;
use crate::webhook::{OverlayConnector, Transport, WebhookDispatcher, select_transport};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builder for a [`Reloader`].
///
/// # Examples
///
/// ```rust,no_run
/// use configmap_reload::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let reloader = Reloader::builder()
///     .with_volume_dir("/etc/config")
///     .with_webhook_url("http://localhost:9090/-/reload")
///     .build()?;
///
/// reloader.run(Shutdown::never()).await;
/// # Ok(())
/// # }
/// ```
pub struct ReloaderBuilder {
    settings: ReloadSettings,
    transport: Option<Arc<dyn Transport>>,
    metrics: Option<Arc<dyn MetricsSink>>,
    connector: Option<Arc<dyn OverlayConnector>>,
}

impl ReloaderBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            settings: ReloadSettings::default(),
            transport: None,
            metrics: None,
            connector: None,
        }
    }

    /// Replace all settings, typically with the output of
    /// [`SettingsLoader::load`](crate::core::SettingsLoader::load).
    pub fn with_settings(mut self, settings: ReloadSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Add a directory to watch.
    pub fn with_volume_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.volume_dirs.push(dir.into());
        self
    }

    /// Add a webhook URL. Targets are called in the order added.
    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.settings.webhook_urls.push(url.into());
        self
    }

    /// Use `transport` for every request, skipping transport selection.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Record outcomes into `metrics` instead of a private [`ReloadMetrics`].
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Make the overlay transport available when an identity file is set.
    pub fn with_overlay_connector(mut self, connector: Arc<dyn OverlayConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Validate the settings, pick a transport and register every directory.
    ///
    /// Nothing is sent until [`Reloader::run`] is called.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The settings are invalid (see [`ReloadSettings::validate`])
    /// - The HTTP client cannot be created
    /// - The default metrics registry cannot be set up
    /// - The platform watcher cannot be created
    /// - Any directory cannot be watched
    pub fn build(self) -> Result<Reloader> {
        let settings = self.settings;
        settings.validate()?;

        let targets = settings.webhook_targets()?;
        let policy = settings.delivery_policy()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => select_transport(
                settings.identity_file.as_deref(),
                &settings.overlay(),
                self.connector.as_deref(),
                settings.request_timeout(),
            )?,
        };
        tracing::debug!(transport = transport.name(), "Transport selected");

        let metrics: Arc<dyn MetricsSink> = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(ReloadMetrics::new()?),
        };

        let dispatcher = WebhookDispatcher::new(targets, policy, transport, Arc::clone(&metrics))?;

        let (mut watcher, streams) = DirectoryWatcher::new()?;
        watcher.watch_all(&settings.volume_dirs)?;

        tracing::info!(
            volume_dirs = ?settings.volume_dirs,
            webhooks = dispatcher.targets().len(),
            "Reloader ready"
        );

        Ok(Reloader {
            watcher,
            streams,
            coordinator: ReloadCoordinator::new(dispatcher, metrics),
        })
    }
}

impl Default for ReloaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A watcher wired to a webhook dispatcher, ready to run.
pub struct Reloader {
    watcher: DirectoryWatcher,
    streams: WatchStreams,
    coordinator: ReloadCoordinator,
}

impl Reloader {
    /// Create a new builder.
    pub fn builder() -> ReloaderBuilder {
        ReloaderBuilder::new()
    }

    /// Directories being watched.
    pub fn watched_dirs(&self) -> &[PathBuf] {
        self.watcher.watched_dirs()
    }

    /// Whether `dir` is being watched.
    pub fn is_watching(&self, dir: impl AsRef<Path>) -> bool {
        self.watched_dirs().iter().any(|d| d == dir.as_ref())
    }

    /// Webhook labels, in delivery order.
    pub fn webhooks(&self) -> Vec<&str> {
        self.coordinator
            .dispatcher()
            .targets()
            .iter()
            .map(|t| t.label())
            .collect()
    }

    /// Process events until `shutdown` fires.
    ///
    /// A delivery cycle in progress finishes its current request; a pending
    /// backoff is abandoned.
    pub async fn run(self, shutdown: Shutdown) -> LoopSummary {
        let Reloader {
            watcher,
            streams,
            coordinator,
        } = self;

        let summary = coordinator.run(streams, shutdown).await;
        drop(watcher);

        tracing::info!(
            reloads = summary.reloads,
            watcher_errors = summary.watcher_errors,
            "Reloader stopped"
        );
        summary
    }
}
