use std::path::{Path, PathBuf};

use serde::de::Error as SerdeDeError;
use tracing::{debug, warn};

use super::CONFIG_FILE_NAME;
use super::types::{ConfigError, RecognizerSettings};
use crate::app_dirs;
use crate::atomic_file::atomic_write;

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir()?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load configuration from the app root, returning defaults if missing.
pub fn load_or_default() -> Result<RecognizerSettings, ConfigError> {
    load_from(&config_path()?)
}

/// Load configuration from `path`; a missing file yields defaults.
pub fn load_from(path: &Path) -> Result<RecognizerSettings, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(RecognizerSettings::default());
    }
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source: SerdeDeError::custom(source),
    })?;
    let settings: RecognizerSettings =
        toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
    let normalized = settings.clone().normalized();
    if normalized != settings {
        warn!(path = %path.display(), "Config values out of range were clamped");
    }
    Ok(normalized)
}

/// Persist configuration to the app root.
pub fn save(settings: &RecognizerSettings) -> Result<(), ConfigError> {
    save_to_path(settings, &config_path()?)
}

/// Write the TOML settings file atomically to prevent partial writes on crash.
pub fn save_to_path(settings: &RecognizerSettings, path: &Path) -> Result<(), ConfigError> {
    let data = toml::to_string_pretty(settings).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    atomic_write(path, data.as_bytes()).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
