//! Change events produced by the directory watcher.

use notify::event::{EventKind, ModifyKind, RenameMode};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of filesystem operation observed on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// An entry appeared under this name (created or moved in).
    Create,
    /// File contents changed.
    Write,
    /// The entry was removed.
    Remove,
    /// The entry was renamed away from this name.
    Rename,
    /// Permissions or other metadata changed.
    Chmod,
}

/// A single filesystem event on a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Path the event refers to
    pub path: PathBuf,
    /// What happened to it
    pub operation: Operation,
}

impl ChangeEvent {
    /// Create a change event.
    pub fn new(path: impl Into<PathBuf>, operation: Operation) -> Self {
        Self {
            path: path.into(),
            operation,
        }
    }

    /// Translate a raw `notify` event into zero or more change events.
    ///
    /// A move into a watched directory counts as [`Operation::Create`] for the
    /// destination name, which is how inotify reports the kubelet's atomic
    /// `..data` symlink swap. Access and unclassified events are dropped.
    pub fn from_notify(event: notify::Event) -> Vec<ChangeEvent> {
        let kind = event.kind;
        event
            .paths
            .into_iter()
            .filter_map(|path| operation_for(&kind).map(|operation| ChangeEvent { path, operation }))
            .collect()
    }

    /// Last segment of the event path, if it has one.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// Path the event refers to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn operation_for(kind: &EventKind) -> Option<Operation> {
    match kind {
        EventKind::Create(_) => Some(Operation::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(Operation::Create),
        // inotify already reported the destination as `To`
        EventKind::Modify(ModifyKind::Name(_)) => Some(Operation::Rename),
        EventKind::Modify(ModifyKind::Metadata(_)) => Some(Operation::Chmod),
        EventKind::Modify(_) => Some(Operation::Write),
        EventKind::Remove(_) => Some(Operation::Remove),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// Error reported by the watcher backend after startup.
///
/// These are never fatal: the coordinator counts and logs them and keeps
/// watching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherError {
    message: String,
    paths: Vec<PathBuf>,
}

impl WatcherError {
    /// Create a watcher error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            paths: Vec::new(),
        }
    }

    /// The backend dropped events and the watched directories must be
    /// treated as changed in unknown ways.
    pub fn overflow(paths: Vec<PathBuf>) -> Self {
        Self {
            message: "event queue overflow, events may have been lost".to_string(),
            paths,
        }
    }

    /// Error description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Paths the backend associated with the error, if any.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl From<notify::Error> for WatcherError {
    fn from(mut err: notify::Error) -> Self {
        let paths = std::mem::take(&mut err.paths);
        Self {
            message: err.to_string(),
            paths,
        }
    }
}

impl fmt::Display for WatcherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.paths.is_empty() {
            write!(f, "{}", self.message)
        } else {
            let paths: Vec<_> = self.paths.iter().map(|p| p.display().to_string()).collect();
            write!(f, "{} ({})", self.message, paths.join(", "))
        }
    }
}

impl std::error::Error for WatcherError {}
