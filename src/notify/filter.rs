//! ConfigMap update detection.
//!
//! The kubelet never edits files in a mounted ConfigMap volume in place. It
//! writes a fresh timestamped revision directory and atomically repoints the
//! hidden `..data` symlink at it. The creation of `..data` is therefore the
//! only event that means "the volume now holds a new revision"; everything
//! else is noise.

use super::event::{ChangeEvent, Operation};

/// Name of the symlink the kubelet swaps on every ConfigMap update.
pub const DATA_SENTINEL: &str = "..data";

/// Whether `event` signals a completed ConfigMap update.
///
/// True only for a [`Operation::Create`] whose last path segment is exactly
/// [`DATA_SENTINEL`].
///
/// # Examples
///
/// ```rust
/// use configmap_reload::notify::{ChangeEvent, Operation, is_reload_signal};
///
/// assert!(is_reload_signal(&ChangeEvent::new("/etc/config/..data", Operation::Create)));
/// assert!(!is_reload_signal(&ChangeEvent::new("/etc/config/app.yaml", Operation::Write)));
/// ```
pub fn is_reload_signal(event: &ChangeEvent) -> bool {
    event.operation == Operation::Create && event.file_name() == Some(DATA_SENTINEL)
}
