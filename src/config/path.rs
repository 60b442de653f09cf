//! Default locations and path resolution for configuration values.
//!
//! Supports absolute paths, paths relative to the config file, and "~" home
//! directory expansion.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{Result, StoreError};

const APP_DIR: &str = "pilot-bridge";
const CONFIG_FILE: &str = "config.toml";

/// `<config dir>/pilot-bridge/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// `<local data dir>/pilot-bridge`, falling back to `./pilot-bridge-data`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir().map_or_else(
        || PathBuf::from("pilot-bridge-data"),
        |dir| dir.join(APP_DIR),
    )
}

/// Resolve the user's home directory.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| StoreError::Other("Could not determine home directory".to_string()))
}

/// Resolve a path taken from a config file.
///
/// 1. `~` and `~/...` expand to the home directory
/// 2. Absolute paths are used as-is
/// 3. Relative paths are joined onto `base` (the config file's directory)
pub fn resolve_path(path: &Path, base: &Path) -> Result<PathBuf> {
    trace!(path = %path.display(), base = %base.display(), "Resolving path");
    let path_str = path.to_string_lossy();

    if path_str == "~" || path_str.starts_with("~/") {
        let home = home_dir()?;
        let resolved = match path_str.strip_prefix("~/") {
            Some(rest) if !rest.is_empty() => home.join(rest),
            _ => home,
        };
        debug!(
            original = %path.display(),
            resolved = %resolved.display(),
            "Expanded home directory path"
        );
        return Ok(resolved);
    }

    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(base.join(path))
}
