//! The reload event loop.

use crate::metrics::MetricsSink;
use crate::notify::{ChangeEvent, WatchStreams, WatcherError, is_reload_signal};
use crate::shutdown::Shutdown;
use crate::webhook::{DeliveryReport, WebhookDispatcher};
use std::sync::Arc;

/// Counters describing one run of the event loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Events that triggered a delivery cycle
    pub reloads: u64,
    /// Events dropped by the change filter
    pub ignored: u64,
    /// Watcher errors observed
    pub watcher_errors: u64,
}

/// Owns the single loop that turns filesystem events into webhook calls.
///
/// The loop services change events, watcher errors and shutdown, whichever
/// is ready. A qualifying change is delivered to every target before the
/// next event is even looked at, so at most one delivery cycle is ever in
/// flight.
pub struct ReloadCoordinator {
    dispatcher: WebhookDispatcher,
    metrics: Arc<dyn MetricsSink>,
}

impl ReloadCoordinator {
    /// Create a coordinator.
    pub fn new(dispatcher: WebhookDispatcher, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            dispatcher,
            metrics,
        }
    }

    /// The dispatcher driven by this loop.
    pub fn dispatcher(&self) -> &WebhookDispatcher {
        &self.dispatcher
    }

    /// Run until shutdown is requested or the event stream closes.
    pub async fn run(&self, mut streams: WatchStreams, mut shutdown: Shutdown) -> LoopSummary {
        let mut summary = LoopSummary::default();
        let mut errors_open = true;

        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    tracing::info!("Shutdown requested, stopping reload loop");
                    break;
                }
                event = streams.events.recv() => match event {
                    Some(event) => {
                        if self.handle_event(event, &mut shutdown).await.is_some() {
                            summary.reloads += 1;
                        } else {
                            summary.ignored += 1;
                        }
                    }
                    None => {
                        tracing::warn!("Watcher event stream closed, stopping reload loop");
                        break;
                    }
                },
                error = streams.errors.recv(), if errors_open => match error {
                    Some(error) => {
                        self.handle_watcher_error(&error);
                        summary.watcher_errors += 1;
                    }
                    None => errors_open = false,
                },
            }
        }

        summary
    }

    /// Filter one event and, if it qualifies, run a full delivery cycle.
    ///
    /// Returns `None` for filtered events.
    pub async fn handle_event(
        &self,
        event: ChangeEvent,
        shutdown: &mut Shutdown,
    ) -> Option<Vec<DeliveryReport>> {
        if !is_reload_signal(&event) {
            tracing::trace!(
                path = %event.path.display(),
                operation = ?event.operation,
                "Ignoring filesystem event"
            );
            return None;
        }

        tracing::info!(path = %event.path.display(), "ConfigMap updated");
        let reports = self.dispatcher.dispatch(shutdown).await;

        let delivered = reports.iter().filter(|r| r.outcome.is_success()).count();
        tracing::debug!(delivered, targets = reports.len(), "Delivery cycle finished");

        Some(reports)
    }

    fn handle_watcher_error(&self, error: &WatcherError) {
        self.metrics.record_watcher_error();
        tracing::error!(error = %error, "Filesystem watcher error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ReloadMetrics;
    use crate::notify::Operation;
    use crate::notify::watcher::forward;
    use crate::shutdown;
    use crate::webhook::{DeliveryPolicy, Transport, TransportError, WebhookTarget};
    use async_trait::async_trait;
    use reqwest::{Request, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn execute(&self, _request: Request) -> Result<StatusCode, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StatusCode::OK)
        }
    }

    fn coordinator(transport: Arc<CountingTransport>, metrics: Arc<ReloadMetrics>) -> ReloadCoordinator {
        let dispatcher = WebhookDispatcher::new(
            vec![WebhookTarget::parse("http://localhost:9090/-/reload").unwrap()],
            DeliveryPolicy::default(),
            transport,
            metrics.clone(),
        )
        .unwrap();
        ReloadCoordinator::new(dispatcher, metrics)
    }

    #[tokio::test]
    async fn test_noise_is_ignored() {
        let transport = Arc::new(CountingTransport::default());
        let metrics = Arc::new(ReloadMetrics::new().unwrap());
        let coordinator = coordinator(transport.clone(), metrics.clone());

        let result = coordinator
            .handle_event(
                ChangeEvent::new("/etc/config/config.yaml", Operation::Write),
                &mut Shutdown::never(),
            )
            .await;

        assert!(result.is_none());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert!(metrics.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_loop_stops_when_events_close() {
        let transport = Arc::new(CountingTransport::default());
        let metrics = Arc::new(ReloadMetrics::new().unwrap());
        let coordinator = coordinator(transport.clone(), metrics.clone());

        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        event_tx
            .send(ChangeEvent::new("/etc/config/..data_tmp", Operation::Create))
            .unwrap();
        event_tx
            .send(ChangeEvent::new("/etc/config/..data", Operation::Create))
            .unwrap();
        error_tx.send(WatcherError::new("queue overflow")).unwrap();
        drop(error_tx);

        // Let the error be picked up before the event stream ends.
        let closer = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            drop(event_tx);
        });

        let summary = coordinator
            .run(WatchStreams { events, errors }, Shutdown::never())
            .await;
        closer.await.unwrap();

        assert_eq!(
            summary,
            LoopSummary {
                reloads: 1,
                ignored: 1,
                watcher_errors: 1,
            }
        );
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.snapshot().watcher_errors, 1);
    }

    #[tokio::test]
    async fn test_overflow_counts_as_watcher_error() {
        let transport = Arc::new(CountingTransport::default());
        let metrics = Arc::new(ReloadMetrics::new().unwrap());
        let coordinator = coordinator(transport.clone(), metrics.clone());

        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        let overflow = notify::Event::new(notify::EventKind::Other)
            .set_flag(notify::event::Flag::Rescan);
        forward(Ok(overflow), &event_tx, &error_tx);
        drop(error_tx);

        let closer = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            drop(event_tx);
        });

        let summary = coordinator
            .run(WatchStreams { events, errors }, Shutdown::never())
            .await;
        closer.await.unwrap();

        assert_eq!(summary.watcher_errors, 1);
        assert_eq!(summary.reloads, 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.snapshot().watcher_errors, 1);
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown() {
        let transport = Arc::new(CountingTransport::default());
        let metrics = Arc::new(ReloadMetrics::new().unwrap());
        let coordinator = coordinator(transport, metrics);

        let (_event_tx, events) = mpsc::unbounded_channel();
        let (_error_tx, errors) = mpsc::unbounded_channel();
        let (trigger, shutdown) = shutdown::channel();
        trigger.trigger();

        let summary = coordinator.run(WatchStreams { events, errors }, shutdown).await;
        assert_eq!(summary, LoopSummary::default());
    }
}
