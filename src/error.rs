//! Error types for device database storage operations.

use thiserror::Error;

/// Primary error type for store, backend and decoder operations.
#[derive(Error, Debug)]
pub enum StoreError {
    // Not-found family
    #[error("Device not found: {name}")]
    DeviceNotFound { name: String },

    #[error("Database file [{name}] does not exist in the backup nor in the install dir")]
    DatabaseNotFound { name: String },

    #[error("Staged file not found in install list: {filename}")]
    StagedFileNotFound { filename: String },

    #[error("Storage entry not found: {path}")]
    EntryNotFound { path: String },

    // Input errors
    #[error("Invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Invalid database: {0}")]
    InvalidDatabase(String),

    // Backend errors
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Archive error: {0}")]
    Archive(String),

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    // Image errors
    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Returns true for the "no prior state" family of errors.
    ///
    /// Callers such as the sync engine treat these as a first-time device or
    /// database rather than as a fatal condition.
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. }
                | Self::DatabaseNotFound { .. }
                | Self::StagedFileNotFound { .. }
                | Self::EntryNotFound { .. }
        )
    }

    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. }
                | Self::DatabaseNotFound { .. }
                | Self::StagedFileNotFound { .. }
                | Self::InvalidName { .. }
                | Self::InvalidDatabase(_)
                | Self::ConfigNotFound { .. }
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::DeviceNotFound { .. } => Some("Run: pilot-bridge devices create <NAME>"),
            Self::DatabaseNotFound { .. } => Some("Run: pilot-bridge db list <DEVICE>"),
            Self::StagedFileNotFound { .. } => Some("Run: pilot-bridge install list <DEVICE>"),
            Self::InvalidDatabase(_) => Some("Only PalmOS .prc and .pdb files are supported"),
            Self::ConfigNotFound { .. } => Some("Check --config or PILOT_BRIDGE_CONFIG"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(format!("sqlite: {err}"))
    }
}

impl From<zip::result::ZipError> for StoreError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

/// Convenience type alias for Results using StoreError.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| StoreError::Other(format!("{}: {e}", f().into())))
    }
}
