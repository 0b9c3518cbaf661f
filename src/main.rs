//! configmap-reload sidecar.
//!
//! Watches ConfigMap volume directories and calls reload webhooks when the
//! kubelet swaps in new contents.
//!
//! # Usage
//! ```sh
//! configmap-reload --volume-dir /etc/config --webhook-url http://localhost:9090/-/reload
//! ```
//!
//! # Environment Variables
//! - `CONFIGMAP_RELOAD_<SETTING>` - any setting, e.g. `CONFIGMAP_RELOAD_WEBHOOK_RETRIES=3`;
//!   `VOLUME_DIRS` and `WEBHOOK_URLS` take comma-separated lists
//! - `RUST_LOG` - log filter (default: info)
//!
//! Metrics are served on `--web.listen-address` (default `0.0.0.0:9533`)
//! under `--web.telemetry-path` (default `/metrics`).

use clap::Parser;
use configmap_reload::core::{Reloader, SettingsLoader};
use configmap_reload::error::Result;
use configmap_reload::metrics::{MetricsServer, ReloadMetrics};
use configmap_reload::shutdown::{self, ShutdownTrigger};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::prelude::*;

const ENV_PREFIX: &str = "CONFIGMAP_RELOAD";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (YAML, TOML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// ConfigMap volume directory to watch; repeatable
    #[arg(long = "volume-dir")]
    volume_dirs: Vec<PathBuf>,

    /// Webhook to call on updates; repeatable, called in order
    #[arg(long = "webhook-url")]
    webhook_urls: Vec<String>,

    /// HTTP method of the reload request [default: POST]
    #[arg(long)]
    webhook_method: Option<String>,

    /// Status code indicating a successful reload [default: 200]
    #[arg(long)]
    webhook_status_code: Option<u16>,

    /// Attempts per webhook and update [default: 1]
    #[arg(long)]
    webhook_retries: Option<u32>,

    /// Seconds to wait after a failed attempt [default: 10]
    #[arg(long)]
    webhook_backoff_secs: Option<u64>,

    /// Overlay identity file; enables the overlay transport
    #[arg(long)]
    identity_file: Option<PathBuf>,

    /// Overlay service name [default: configmap-reload]
    #[arg(long)]
    overlay_service: Option<String>,

    /// Overlay identity hosting the service
    #[arg(long)]
    overlay_target_identity: Option<String>,

    /// Address to serve metrics on [default: 0.0.0.0:9533]
    #[arg(long = "web.listen-address")]
    web_listen_address: Option<String>,

    /// Path under which to expose metrics [default: /metrics]
    #[arg(long = "web.telemetry-path")]
    web_telemetry_path: Option<String>,
}

impl Cli {
    /// Settings loader with only the flags actually given as overrides.
    fn loader(&self) -> SettingsLoader {
        let mut loader = SettingsLoader::new();
        if let Some(path) = &self.config {
            loader = loader.with_file(path);
        }
        loader = loader.with_env_overrides(ENV_PREFIX, "__");

        if !self.volume_dirs.is_empty() {
            let dirs: Vec<String> = self
                .volume_dirs
                .iter()
                .map(|dir| dir.to_string_lossy().into_owned())
                .collect();
            loader = loader.with_override("volume_dirs", dirs);
        }
        if !self.webhook_urls.is_empty() {
            loader = loader.with_override("webhook_urls", self.webhook_urls.clone());
        }
        if let Some(method) = &self.webhook_method {
            loader = loader.with_override("webhook_method", method.as_str());
        }
        if let Some(status) = self.webhook_status_code {
            loader = loader.with_override("webhook_status_code", i64::from(status));
        }
        if let Some(retries) = self.webhook_retries {
            loader = loader.with_override("webhook_retries", i64::from(retries));
        }
        if let Some(backoff) = self.webhook_backoff_secs {
            loader = loader.with_override("webhook_backoff_secs", backoff);
        }
        if let Some(path) = &self.identity_file {
            loader = loader.with_override("identity_file", path.to_string_lossy().into_owned());
        }
        if let Some(service) = &self.overlay_service {
            loader = loader.with_override("overlay_service", service.as_str());
        }
        if let Some(identity) = &self.overlay_target_identity {
            loader = loader.with_override("overlay_target_identity", identity.as_str());
        }
        if let Some(addr) = &self.web_listen_address {
            loader = loader.with_override("web_listen_address", addr.as_str());
        }
        if let Some(path) = &self.web_telemetry_path {
            loader = loader.with_override("web_telemetry_path", path.as_str());
        }
        loader
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "configmap-reload failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    tracing::info!("configmap-reload {} starting", env!("CARGO_PKG_VERSION"));

    let settings = cli.loader().load()?;
    settings.validate()?;
    tracing::debug!(settings = ?settings, "Settings loaded");

    let metrics = Arc::new(ReloadMetrics::new()?);
    let server = MetricsServer::bind(
        &settings.web_listen_address,
        &settings.web_telemetry_path,
        Arc::clone(&metrics),
    )
    .await?;

    let reloader = Reloader::builder()
        .with_settings(settings)
        .with_metrics(metrics)
        .build()?;

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(forward_signals(trigger));

    let server = tokio::spawn(server.run(shutdown.clone()));
    reloader.run(shutdown).await;

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Metrics server stopped"),
        Err(e) => tracing::error!(error = %e, "Metrics server task failed"),
    }
    Ok(())
}

async fn forward_signals(trigger: ShutdownTrigger) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM, only Ctrl+C will stop");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    trigger.trigger();
}
