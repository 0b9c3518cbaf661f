//! Settings loader that layers files, environment variables and overrides.

use super::settings::ReloadSettings;
use crate::error::{ReloadError, Result};
use config::{Environment, File};
use std::path::PathBuf;

/// Keys whose environment values are comma-separated lists.
const LIST_KEYS: [&str; 2] = ["volume_dirs", "webhook_urls"];

/// Loads [`ReloadSettings`] from layered sources.
///
/// Layers are merged in a fixed order, later ones overriding earlier ones:
/// settings files (in the order added), environment variables, explicit
/// overrides (typically command-line flags).
///
/// # Examples
///
/// ```rust,no_run
/// use configmap_reload::core::SettingsLoader;
///
/// # fn example() -> configmap_reload::error::Result<()> {
/// // CONFIGMAP_RELOAD_WEBHOOK_URLS=http://a/reload,http://b/reload
/// let settings = SettingsLoader::new()
///     .with_file("/etc/configmap-reload/settings.yaml")
///     .with_env_overrides("CONFIGMAP_RELOAD", "__")
///     .with_override("webhook_retries", 3i64)
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SettingsLoader {
    files: Vec<PathBuf>,
    env_prefix: Option<String>,
    env_separator: Option<String>,
    overrides: Vec<(String, config::Value)>,
}

impl SettingsLoader {
    /// Create a loader with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a settings file. The format (YAML, TOML, JSON) follows the
    /// extension; the file must exist.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Read environment variables named `<PREFIX>_<KEY>`.
    ///
    /// `separator` splits nested keys. `volume_dirs` and `webhook_urls` take
    /// comma-separated lists.
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.env_separator = Some(separator.to_string());
        self
    }

    /// Set `key` to `value`, overriding every other source.
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<config::Value>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Merge every source and deserialize the result.
    ///
    /// Does not validate; call [`ReloadSettings::validate`] on the result.
    ///
    /// # Errors
    ///
    /// Returns an error if a file is missing or malformed, or if a value
    /// has the wrong type.
    pub fn load(&self) -> Result<ReloadSettings> {
        let mut builder = config::Config::builder();

        for path in &self.files {
            builder = builder.add_source(File::from(path.clone()).required(true));
        }

        if let Some(prefix) = &self.env_prefix {
            let mut env = Environment::with_prefix(prefix)
                .prefix_separator("_")
                .try_parsing(true)
                .list_separator(",");
            if let Some(separator) = &self.env_separator {
                env = env.separator(separator);
            }
            for key in LIST_KEYS {
                env = env.with_list_parse_key(key);
            }
            builder = builder.add_source(env);
        }

        for (key, value) in &self.overrides {
            builder = builder.set_override(key.as_str(), value.clone()).map_err(|e| {
                ReloadError::LoadError(format!("override '{}': {}", key, e))
            })?;
        }

        let config = builder
            .build()
            .map_err(|e| ReloadError::LoadError(e.to_string()))?;

        config
            .try_deserialize::<ReloadSettings>()
            .map_err(|e| ReloadError::DeserializationError(e.to_string()))
    }

    /// Number of settings files added.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}
