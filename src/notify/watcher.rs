//! Directory watching for ConfigMap volumes.

use super::event::{ChangeEvent, WatcherError};
use crate::error::{ReloadError, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Receiving ends of a watcher: change events and backend errors.
///
/// Both channels are unbounded and preserve backend order. The coordinator
/// consumes them; tests may build one directly from their own channels.
pub struct WatchStreams {
    /// Translated filesystem events
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
    /// Errors raised by the watcher backend after startup
    pub errors: mpsc::UnboundedReceiver<WatcherError>,
}

/// Watches a fixed set of directories for filesystem events.
///
/// Directories are registered once, non-recursively, and stay registered
/// until the watcher is dropped. A failed registration is returned as an
/// error the caller is expected to treat as fatal.
///
/// # Examples
///
/// ```rust,no_run
/// use configmap_reload::notify::{DirectoryWatcher, is_reload_signal};
///
/// # async fn example() -> configmap_reload::error::Result<()> {
/// let (mut watcher, mut streams) = DirectoryWatcher::new()?;
/// watcher.watch("/etc/config")?;
///
/// while let Some(event) = streams.events.recv().await {
///     if is_reload_signal(&event) {
///         println!("ConfigMap updated");
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    watched_dirs: Vec<PathBuf>,
}

impl DirectoryWatcher {
    /// Create a watcher with no directories registered yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn new() -> Result<(Self, WatchStreams)> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        // Runs on the backend's own thread; sends only fail once the
        // coordinator has gone away.
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            forward(res, &event_tx, &error_tx)
        })
        .map_err(|e| ReloadError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        Ok((
            Self {
                watcher,
                watched_dirs: Vec::new(),
            },
            WatchStreams {
                events: event_rx,
                errors: error_rx,
            },
        ))
    }

    /// Register a directory.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError::WatchRegistration`] if the backend refuses the
    /// path (missing directory, permission denied, watch limit reached).
    pub fn watch(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref().to_path_buf();

        tracing::info!(directory = %dir.display(), "Watching directory");
        self.watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| ReloadError::WatchRegistration {
                path: dir.clone(),
                reason: WatcherError::from(e).message().to_string(),
            })?;

        if !self.watched_dirs.contains(&dir) {
            self.watched_dirs.push(dir);
        }

        Ok(())
    }

    /// Register every directory in order, stopping at the first failure.
    pub fn watch_all<I, P>(&mut self, dirs: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        dirs.into_iter().try_for_each(|dir| self.watch(dir))
    }

    /// Directories registered so far, in registration order.
    pub fn watched_dirs(&self) -> &[PathBuf] {
        &self.watched_dirs
    }
}

/// Route one backend notification to the matching stream.
///
/// A rescan request (inotify queue overflow) carries no usable event, so it
/// is reported as a [`WatcherError`] instead of being dropped.
pub(crate) fn forward(
    res: notify::Result<notify::Event>,
    event_tx: &mpsc::UnboundedSender<ChangeEvent>,
    error_tx: &mpsc::UnboundedSender<WatcherError>,
) {
    match res {
        Ok(event) if event.need_rescan() => {
            let _ = error_tx.send(WatcherError::overflow(event.paths));
        }
        Ok(event) => {
            for change in ChangeEvent::from_notify(event) {
                let _ = event_tx.send(change);
            }
        }
        Err(err) => {
            let _ = error_tx.send(WatcherError::from(err));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Operation, is_reload_signal};
    use notify::event::{CreateKind, EventKind, Flag};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_watcher_creation() {
        let result = DirectoryWatcher::new();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_watch_directory() {
        let temp_dir = TempDir::new().unwrap();

        let (mut watcher, _streams) = DirectoryWatcher::new().unwrap();
        watcher.watch(temp_dir.path()).unwrap();
        watcher.watch(temp_dir.path()).unwrap();

        assert_eq!(watcher.watched_dirs(), &[temp_dir.path().to_path_buf()]);
    }

    #[tokio::test]
    async fn test_watch_nonexistent_directory() {
        let (mut watcher, _streams) = DirectoryWatcher::new().unwrap();
        let result = watcher.watch("/nonexistent/configmap");
        assert!(matches!(
            result,
            Err(ReloadError::WatchRegistration { ref path, .. }) if path == Path::new("/nonexistent/configmap")
        ));
        assert!(watcher.watched_dirs().is_empty());
    }

    #[tokio::test]
    async fn test_watch_all_stops_at_first_failure() {
        let first = TempDir::new().unwrap();
        let last = TempDir::new().unwrap();

        let (mut watcher, _streams) = DirectoryWatcher::new().unwrap();
        let result = watcher.watch_all([
            first.path(),
            Path::new("/nonexistent/configmap"),
            last.path(),
        ]);

        assert!(result.is_err());
        assert_eq!(watcher.watched_dirs(), &[first.path().to_path_buf()]);
    }

    #[test]
    fn test_overflow_is_reported_as_error() {
        let (event_tx, mut events) = mpsc::unbounded_channel();
        let (error_tx, mut errors) = mpsc::unbounded_channel();

        let overflow = notify::Event::new(EventKind::Other).set_flag(Flag::Rescan);
        forward(Ok(overflow), &event_tx, &error_tx);

        let error = errors.try_recv().unwrap();
        assert_eq!(error.message(), "event queue overflow, events may have been lost");
        assert!(error.paths().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_forward_routes_events_and_errors() {
        let (event_tx, mut events) = mpsc::unbounded_channel();
        let (error_tx, mut errors) = mpsc::unbounded_channel();

        let create = notify::Event::new(EventKind::Create(CreateKind::Any))
            .add_path(PathBuf::from("/etc/config/..data"));
        forward(Ok(create), &event_tx, &error_tx);
        forward(
            Err(notify::Error::generic("inotify read failed")),
            &event_tx,
            &error_tx,
        );

        assert_eq!(
            events.try_recv().unwrap(),
            ChangeEvent::new("/etc/config/..data", Operation::Create)
        );
        assert_eq!(errors.try_recv().unwrap().message(), "inotify read failed");
    }

    #[tokio::test]
    async fn test_file_write_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let (mut watcher, mut streams) = DirectoryWatcher::new().unwrap();
        watcher.watch(temp_dir.path()).unwrap();

        fs::write(temp_dir.path().join("config.yaml"), "port: 9090").unwrap();

        let event = timeout(Duration::from_secs(2), streams.events.recv())
            .await
            .expect("no event within timeout")
            .expect("event channel closed");
        assert_eq!(event.file_name(), Some("config.yaml"));
        assert!(!is_reload_signal(&event));
    }

    // Mirrors the kubelet's atomic writer: build `..data_tmp`, rename it
    // over `..data`.
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_atomic_symlink_swap_is_reload_signal() {
        let temp_dir = TempDir::new().unwrap();
        let revision = temp_dir.path().join("..2024_01_01_00_00_00.000000001");
        fs::create_dir(&revision).unwrap();
        fs::write(revision.join("config.yaml"), "port: 9090").unwrap();

        let (mut watcher, mut streams) = DirectoryWatcher::new().unwrap();
        watcher.watch(temp_dir.path()).unwrap();

        std::os::unix::fs::symlink(&revision, temp_dir.path().join("..data_tmp")).unwrap();
        fs::rename(
            temp_dir.path().join("..data_tmp"),
            temp_dir.path().join("..data"),
        )
        .unwrap();

        let found = timeout(Duration::from_secs(2), async {
            while let Some(event) = streams.events.recv().await {
                if is_reload_signal(&event) {
                    return Some(event);
                }
            }
            None
        })
        .await
        .expect("no reload signal within timeout")
        .expect("event channel closed");

        assert_eq!(found.operation, Operation::Create);
        assert_eq!(found.file_name(), Some("..data"));
    }
}
