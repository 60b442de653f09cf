//! Install-list state transitions.
//!
//! A staged file is represented by a [`StagedInstall`] token. The token is
//! consumed by exactly one of [`DeviceStore::promote`] (once the handheld has
//! accepted the database) or [`DeviceStore::discard`] (the user changed their
//! mind), so a file cannot be both promoted and discarded.

use serde::Serialize;
use tracing::debug;

use super::DeviceStore;
use crate::error::Result;
use crate::pdb::Database;

/// A database sitting in a device's install partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedInstall {
    device: String,
    filename: String,
    database: Database,
}

impl StagedInstall {
    pub(super) fn new(device: &str, filename: String, database: Database) -> Self {
        Self {
            device: device.to_string(),
            filename,
            database,
        }
    }

    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Name the file was staged under.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.database
    }

    /// Name the database will have in the backup partition once promoted.
    #[must_use]
    pub fn backup_name(&self) -> String {
        self.database.file_name()
    }

    #[must_use]
    pub fn into_parts(self) -> (String, String, Database) {
        (self.device, self.filename, self.database)
    }
}

/// Final state of a staged install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InstallOutcome {
    Promoted { filename: String, backup_name: String },
    Discarded { filename: String },
}

impl DeviceStore {
    /// Tokens for every file in the install queue.
    pub async fn staged_installs(&self, device: &str) -> Result<Vec<StagedInstall>> {
        let queue = self.list_install_queue(device).await?;
        Ok(queue
            .filenames
            .into_iter()
            .zip(queue.databases)
            .map(|(filename, database)| StagedInstall::new(device, filename, database))
            .collect())
    }

    /// Staged -> Promoted.
    pub async fn promote(&self, staged: StagedInstall) -> Result<InstallOutcome> {
        let (device, filename, database) = staged.into_parts();
        let backup_name = self
            .promote_installed(&device, &database, &filename)
            .await?;
        debug!(
            device = %device,
            filename = %filename,
            backup = %backup_name,
            "Install transition: promoted"
        );
        Ok(InstallOutcome::Promoted {
            filename,
            backup_name,
        })
    }

    /// Staged -> Discarded.
    pub async fn discard(&self, staged: StagedInstall) -> Result<InstallOutcome> {
        let (device, filename, _) = staged.into_parts();
        self.discard_staged_install(&device, &filename).await?;
        debug!(device = %device, filename = %filename, "Install transition: discarded");
        Ok(InstallOutcome::Discarded { filename })
    }
}
