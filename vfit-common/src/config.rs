//! Configuration file and data folder resolution
//!
//! Both lookups follow the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform location (user config dir / data-local dir)
//! 4. Compiled default (fallback)
//!
//! A missing configuration file is never fatal: callers get the compiled
//! defaults and a warning.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name used under the platform config/data directories
pub const APP_DIR_NAME: &str = "vfit";

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "VFIT_CONFIG";

/// Environment variable naming the data folder (database, clip cache)
pub const DATA_DIR_ENV_VAR: &str = "VFIT_DATA_DIR";

/// Locate the configuration file to load, if any.
///
/// Returns `None` when no candidate exists; the caller then runs on
/// compiled defaults. An explicit CLI or environment path is returned even
/// if it does not exist so that `load_toml_or_default` can warn about it.
pub fn resolve_config_file(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    platform_config_file().filter(|p| p.exists())
}

/// Resolve the data folder holding the SQLite database.
pub fn resolve_data_folder(cli_arg: Option<&Path>, env_var_name: &str) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_data_folder()
}

/// Create the data folder if it does not exist yet.
pub fn ensure_data_folder(folder: &Path) -> Result<()> {
    if !folder.exists() {
        info!("Creating data folder: {}", folder.display());
        std::fs::create_dir_all(folder)?;
    }
    Ok(())
}

/// Parse a TOML document into `T`, reporting the file in the error.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(toml::from_str(&content)?)
}

/// Load `T` from `path`, falling back to `T::default()` when the file is
/// absent or unreadable.
///
/// A file that exists but fails to parse is an error: silently ignoring a
/// typo in a config file would hide the user's intent.
pub fn load_toml_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        info!("No configuration file found, using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(
            "Configuration file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(T::default());
    }

    info!("Loading configuration from {}", path.display());
    load_toml(path)
}

/// Platform location of the user configuration file
pub fn platform_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"))
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "macos") {
        // ~/Library/Application Support/vfit
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("./vfit_data"))
    } else {
        // ~/.local/share/vfit or %LOCALAPPDATA%\vfit
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("./vfit_data"))
    }
}
