//! Store configuration.
//!
//! Read from a TOML file:
//!
//! ```toml
//! backend = "sqlite"          # fs | sqlite | memory
//! data_dir = "~/palm"         # relative paths are relative to this file
//! root_namespace = "pilot-bridge"
//! ```
//!
//! Every key is optional. Command-line flags override file values.

mod path;

pub use path::{default_config_path, default_data_dir, home_dir, resolve_path};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::storage::{FsBackend, MemoryBackend, SharedBackend, SqliteBackend};
use crate::store::{DEFAULT_ROOT, DeviceStore};

/// File name of the SQLite database inside `data_dir`.
pub const SQLITE_FILE: &str = "pilot-bridge.db";

/// Which storage backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Directory tree on the local filesystem.
    #[default]
    Fs,
    /// Single SQLite database file.
    Sqlite,
    /// In-process map; nothing survives the process.
    Memory,
}

/// Effective store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub data_dir: PathBuf,
    pub root_namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            data_dir: default_data_dir(),
            root_namespace: DEFAULT_ROOT.to_string(),
        }
    }
}

impl StoreConfig {
    /// Load settings.
    ///
    /// With an explicit `path` the file must exist. Without one, the default
    /// location is tried and defaults are used if it is absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_config_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.is_file() {
            if explicit {
                return Err(StoreError::ConfigNotFound {
                    path: path.display().to_string(),
                });
            }
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::from_toml(&text, base)?;
        info!(path = %path.display(), backend = ?config.backend, "Loaded config");
        Ok(config)
    }

    /// Parse TOML text; a relative `data_dir` is resolved against `base`.
    pub fn from_toml(text: &str, base: &Path) -> Result<Self> {
        let mut config: Self =
            toml::from_str(text).map_err(|e| StoreError::ConfigParse(e.to_string()))?;
        config.data_dir = resolve_path(&config.data_dir, base)?;
        if config.root_namespace.is_empty() {
            return Err(StoreError::ConfigParse(
                "root_namespace must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    /// Open the configured backend, creating its storage if needed.
    pub fn open_backend(&self) -> Result<SharedBackend> {
        let backend: SharedBackend = match self.backend {
            BackendKind::Fs => Arc::new(FsBackend::open(&self.data_dir)?),
            BackendKind::Sqlite => Arc::new(SqliteBackend::open(self.data_dir.join(SQLITE_FILE))?),
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
        };
        debug!(kind = backend.kind(), data_dir = %self.data_dir.display(), "Opened backend");
        Ok(backend)
    }

    pub fn open_store(&self) -> Result<DeviceStore> {
        Ok(DeviceStore::with_root(
            self.open_backend()?,
            self.root_namespace.clone(),
        ))
    }
}
