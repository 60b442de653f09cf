//! Per-device database store.
//!
//! Layout under the backend origin:
//!
//! ```text
//! /
//! ├── device_id                  # client identity (see `computer_id`)
//! └── pilot-bridge/              # root namespace
//!     └── <device>/
//!         ├── backup/            # last known handheld state, header-derived names
//!         └── install/           # staged files, caller-supplied names
//! ```
//!
//! Every operation goes through the injected [`StorageBackend`]; the store
//! itself keeps no state besides the cached client identifier. Writes rely on
//! the backend's atomic replace, so a failed write leaves the previous
//! version intact. Two callers writing the same database name for the same
//! device race, and the last write to complete wins.

mod archive;
mod identity;
mod install;

pub use archive::{ImportSummary, default_archive_name};
pub use install::{InstallOutcome, StagedInstall};

use std::fmt;
use std::path::Path;

use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ResultExt, StoreError};
use crate::pdb::Database;
use crate::storage::{DirHandle, FileHandle, SharedBackend, StorageBackend};

/// Default root namespace directory.
pub const DEFAULT_ROOT: &str = "pilot-bridge";

pub(crate) const BACKUP_DIR: &str = "backup";
pub(crate) const INSTALL_DIR: &str = "install";

/// Whether a staged file name is picked up by the install queue.
///
/// Matching is case-sensitive: `APP.PRC` is not queued.
#[must_use]
pub fn is_installable_file_name(name: &str) -> bool {
    name.ends_with(".prc") || name.ends_with(".pdb")
}

/// An externally supplied file to stage for installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InstallFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping its file name.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::Other(format!("Not a file path: {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self { name, bytes })
    }

    /// Parse the bytes as a PDB/PRC container.
    pub fn parse(&self) -> Result<Database> {
        parse_named(&self.name, &self.bytes)
    }
}

/// Databases staged in a device's install partition.
///
/// `databases[i]` was parsed from the file named `filenames[i]`.
#[derive(Debug, Clone, Default)]
pub struct InstallQueue {
    pub databases: Vec<Database>,
    pub filenames: Vec<String>,
}

impl InstallQueue {
    #[must_use]
    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }

    /// `(filename, database)` pairs in listing order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Database)> {
        self.filenames
            .iter()
            .map(String::as_str)
            .zip(self.databases.iter())
    }
}

/// Device database store over a [`StorageBackend`].
pub struct DeviceStore {
    backend: SharedBackend,
    root_name: String,
    computer_id: OnceCell<u32>,
}

impl fmt::Debug for DeviceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceStore")
            .field("backend", &self.backend.kind())
            .field("root_name", &self.root_name)
            .finish_non_exhaustive()
    }
}

/// Maps a missing device directory or partition to `DeviceNotFound`.
fn device_error(err: StoreError, device: &str) -> StoreError {
    match err {
        StoreError::EntryNotFound { .. } => StoreError::DeviceNotFound {
            name: device.to_string(),
        },
        other => other,
    }
}

/// Parse a container, naming the file in the error.
pub(crate) fn parse_named(file_name: &str, bytes: &[u8]) -> Result<Database> {
    Database::parse(bytes).map_err(|e| match e {
        StoreError::InvalidDatabase(msg) => {
            StoreError::InvalidDatabase(format!("{file_name}: {msg}"))
        }
        other => other,
    })
}

impl DeviceStore {
    /// Store using the default root namespace.
    #[must_use]
    pub fn new(backend: SharedBackend) -> Self {
        Self::with_root(backend, DEFAULT_ROOT)
    }

    #[must_use]
    pub fn with_root(backend: SharedBackend, root_name: impl Into<String>) -> Self {
        Self {
            backend,
            root_name: root_name.into(),
            computer_id: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    #[must_use]
    pub fn root_namespace(&self) -> &str {
        &self.root_name
    }

    async fn root_dir(&self) -> Result<DirHandle> {
        self.backend
            .get_directory(&DirHandle::origin(), &self.root_name, true)
            .await
    }

    async fn partition(&self, device: &str, partition: &str, create: bool) -> Result<DirHandle> {
        let root = self.root_dir().await?;
        let device_dir = self
            .backend
            .get_directory(&root, device, create)
            .await
            .map_err(|e| device_error(e, device))?;
        self.backend
            .get_directory(&device_dir, partition, create)
            .await
            .map_err(|e| device_error(e, device))
    }

    async fn backup_dir(&self, device: &str) -> Result<DirHandle> {
        self.partition(device, BACKUP_DIR, false).await
    }

    async fn install_dir(&self, device: &str) -> Result<DirHandle> {
        self.partition(device, INSTALL_DIR, false).await
    }

    /// Resolve an existing file, `Ok(None)` when it is missing.
    async fn find_file(&self, dir: &DirHandle, name: &str) -> Result<Option<FileHandle>> {
        match self.backend.get_file(dir, name, false).await {
            Ok(file) => Ok(Some(file)),
            Err(StoreError::EntryNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------
    // Devices
    // ------------------------------------------------------------------

    /// Provision the backup and install partitions. Idempotent.
    #[instrument(skip(self))]
    pub async fn create_device(&self, device: &str) -> Result<()> {
        self.partition(device, BACKUP_DIR, true).await?;
        self.partition(device, INSTALL_DIR, true).await?;
        info!(device, "Device ready");
        Ok(())
    }

    /// True iff the device's backup partition resolves.
    pub async fn device_exists(&self, device: &str) -> Result<bool> {
        match self.backup_dir(device).await {
            Ok(_) => Ok(true),
            Err(StoreError::DeviceNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete a device's namespace including every database in it.
    #[instrument(skip(self))]
    pub async fn remove_device(&self, device: &str) -> Result<()> {
        let root = self.root_dir().await?;
        self.backend
            .remove_entry(&root, device, true)
            .await
            .map_err(|e| device_error(e, device))?;
        info!(device, "Device removed");
        Ok(())
    }

    /// Names of every device namespace under the root, sorted.
    pub async fn list_devices(&self) -> Result<Vec<String>> {
        let root = self.root_dir().await?;
        let devices = self
            .backend
            .entries(&root)
            .await?
            .into_iter()
            .filter(|entry| entry.is_dir())
            .map(|entry| entry.name)
            .collect();
        Ok(devices)
    }

    // ------------------------------------------------------------------
    // Backup partition
    // ------------------------------------------------------------------

    /// Serialize `db` into `backup/<name>.<prc|pdb>`, replacing prior content.
    ///
    /// Returns the header-derived file name that was written.
    pub async fn write_database(&self, device: &str, db: &Database) -> Result<String> {
        let file_name = db.file_name();
        debug!(device, db = %file_name, entries = db.entries().len(), "Writing database");
        self.write_database_buffer(device, &file_name, &db.serialize()?)
            .await?;
        Ok(file_name)
    }

    /// Write raw bytes to `backup/<db_name>`, replacing prior content.
    pub async fn write_database_buffer(
        &self,
        device: &str,
        db_name: &str,
        bytes: &[u8],
    ) -> Result<()> {
        let backup = self.backup_dir(device).await?;
        let file = self.backend.get_file(&backup, db_name, true).await?;
        self.backend.write_file(&file, bytes).await?;
        debug!(device, db = db_name, len = bytes.len(), "Database buffer written");
        Ok(())
    }

    /// Raw bytes of `db_name`, looked up in `backup/` and then `install/`.
    pub async fn read_database_buffer(&self, device: &str, db_name: &str) -> Result<Vec<u8>> {
        debug!(device, db = db_name, "Reading database");
        let backup = self.backup_dir(device).await?;
        if let Some(file) = self.find_file(&backup, db_name).await? {
            return self.backend.read_file(&file).await;
        }

        let install = match self.install_dir(device).await {
            Ok(dir) => Some(dir),
            Err(StoreError::DeviceNotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        if let Some(install) = install {
            if let Some(file) = self.find_file(&install, db_name).await? {
                return self.backend.read_file(&file).await;
            }
        }

        Err(StoreError::DatabaseNotFound {
            name: db_name.to_string(),
        })
    }

    /// Read and parse `db_name`; the header's resource bit picks PDB or PRC.
    pub async fn read_database(&self, device: &str, db_name: &str) -> Result<Database> {
        let bytes = self.read_database_buffer(device, db_name).await?;
        parse_named(db_name, &bytes)
    }

    /// True iff `backup/<db_name>` exists and is non-empty.
    pub async fn database_exists(&self, device: &str, db_name: &str) -> Result<bool> {
        let backup = self.backup_dir(device).await?;
        let Some(file) = self.find_file(&backup, db_name).await? else {
            return Ok(false);
        };
        let size = self.backend.file_size(&file).await?;
        debug!(device, db = db_name, size, "Checked database");
        Ok(size != 0)
    }

    /// Parse every file in the backup partition.
    ///
    /// An empty placeholder file fails the listing with `InvalidDatabase`,
    /// even though `database_exists` reports the same file as absent.
    pub async fn list_all_databases(&self, device: &str) -> Result<Vec<Database>> {
        let backup = self.backup_dir(device).await?;
        let mut databases = Vec::new();
        for entry in self.backend.entries(&backup).await? {
            if !entry.is_file() {
                continue;
            }
            let bytes = self.backend.read_file(&backup.file(&entry.name)).await?;
            databases.push(parse_named(&entry.name, &bytes)?);
        }
        debug!(device, count = databases.len(), "Listed backup databases");
        Ok(databases)
    }

    /// Backup file names without parsing them.
    pub async fn list_backup_files(&self, device: &str) -> Result<Vec<String>> {
        let backup = self.backup_dir(device).await?;
        Ok(self
            .backend
            .entries(&backup)
            .await?
            .into_iter()
            .filter(|e| e.is_file())
            .map(|e| e.name)
            .collect())
    }

    // ------------------------------------------------------------------
    // Install partition
    // ------------------------------------------------------------------

    /// Parse every `.prc`/`.pdb` file in the install partition.
    pub async fn list_install_queue(&self, device: &str) -> Result<InstallQueue> {
        let install = self.install_dir(device).await?;
        let mut queue = InstallQueue::default();
        for entry in self.backend.entries(&install).await? {
            if !entry.is_file() || !is_installable_file_name(&entry.name) {
                continue;
            }
            let bytes = self.backend.read_file(&install.file(&entry.name)).await?;
            queue.databases.push(parse_named(&entry.name, &bytes)?);
            queue.filenames.push(entry.name);
        }
        debug!(device, count = queue.len(), "Listed install queue");
        Ok(queue)
    }

    /// Copy `file` into `install/<file.name>`, keeping its name.
    ///
    /// The bytes must parse as a container; nothing is written otherwise.
    #[instrument(skip(self, file), fields(filename = %file.name))]
    pub async fn stage_for_install(&self, device: &str, file: &InstallFile) -> Result<StagedInstall> {
        let database = file.parse()?;
        if !is_installable_file_name(&file.name) {
            warn!(
                device,
                filename = %file.name,
                "Staged file lacks a .prc/.pdb extension and will not be queued"
            );
        }

        let install = self.install_dir(device).await?;
        let handle = self.backend.get_file(&install, &file.name, true).await?;
        self.backend.write_file(&handle, &file.bytes).await?;
        info!(device, filename = %file.name, db = %database.header.name, "Staged for install");
        Ok(StagedInstall::new(device, file.name.clone(), database))
    }

    /// Delete a staged file without promoting it.
    pub async fn discard_staged_install(&self, device: &str, filename: &str) -> Result<()> {
        let install = self.install_dir(device).await?;
        self.backend
            .remove_entry(&install, filename, false)
            .await
            .map_err(|e| match e {
                StoreError::EntryNotFound { .. } => StoreError::StagedFileNotFound {
                    filename: filename.to_string(),
                },
                other => other,
            })?;
        info!(device, filename, "Discarded staged install");
        Ok(())
    }

    /// Move a staged file's bytes to `backup/<db.file_name()>` and drop it
    /// from `install/`. Returns the backup file name.
    #[instrument(skip(self, db))]
    pub async fn promote_installed(
        &self,
        device: &str,
        db: &Database,
        filename: &str,
    ) -> Result<String> {
        let install = self.install_dir(device).await?;
        let backup = self.backup_dir(device).await?;

        let staged = self
            .find_file(&install, filename)
            .await?
            .ok_or_else(|| StoreError::StagedFileNotFound {
                filename: filename.to_string(),
            })?;
        let bytes = self.backend.read_file(&staged).await?;

        let backup_name = db.file_name();
        let target = self.backend.get_file(&backup, &backup_name, true).await?;
        self.backend.write_file(&target, &bytes).await?;
        self.backend.remove_entry(&install, filename, false).await?;

        info!(device, filename, backup = %backup_name, "Promoted installed database");
        Ok(backup_name)
    }

    // ------------------------------------------------------------------
    // Client identity
    // ------------------------------------------------------------------

    /// Stable 32-bit identifier of this client.
    ///
    /// Derived once from a persisted random UUID, then cached. It is a
    /// best-effort tag: two clients can collide.
    pub async fn computer_id(&self) -> Result<u32> {
        self.computer_id
            .get_or_try_init(|| identity::load_or_create(self.backend.as_ref()))
            .await
            .copied()
    }
}
