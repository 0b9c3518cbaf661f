//! Settings, assembly and the reload loop.

mod builder;
mod coordinator;
mod loader;
mod settings;

pub use builder::{Reloader, ReloaderBuilder};
pub use coordinator::{LoopSummary, ReloadCoordinator};
pub use loader::SettingsLoader;
pub use settings::{DEFAULT_LISTEN_ADDRESS, DEFAULT_TELEMETRY_PATH, ReloadSettings};
