//! Filesystem change detection.
//!
//! [`DirectoryWatcher`] turns backend notifications into [`ChangeEvent`]s and
//! [`WatcherError`]s; [`is_reload_signal`] decides which events mean a
//! ConfigMap volume was actually updated.

mod event;
pub mod filter;
pub mod watcher;

pub use event::{ChangeEvent, Operation, WatcherError};
pub use filter::{DATA_SENTINEL, is_reload_signal};
pub use watcher::{DirectoryWatcher, WatchStreams};
