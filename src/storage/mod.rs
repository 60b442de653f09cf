//! Hierarchical storage backend abstraction.
//!
//! The store never touches a filesystem directly. It walks directory and file
//! handles through a [`StorageBackend`], so the same store logic runs on the
//! OS filesystem, on an embedded SQLite database, or on an in-memory map in
//! tests.
//!
//! # Contract
//!
//! - `get_directory` / `get_file` resolve a child of a directory, creating it
//!   when `create` is set. Resolving a missing entry without `create` is
//!   [`StoreError::EntryNotFound`].
//! - `write_file` replaces the whole content atomically: readers observe
//!   either the previous bytes or the new bytes, never a mix.
//! - `entries` lists direct children sorted by name.
//! - `remove_entry` refuses to delete a non-empty directory unless
//!   `recursive` is set.
//! - Entry names are single path components (see [`validate_entry_name`]).

mod fs;
mod memory;
mod sqlite;

pub use fs::FsBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// Handle to a directory, addressed by its path from the backend origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DirHandle {
    segments: Vec<String>,
}

impl DirHandle {
    /// The top of the backend's hierarchy.
    #[must_use]
    pub fn origin() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_origin(&self) -> bool {
        self.segments.is_empty()
    }

    /// Name of this directory (`None` for the origin).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path components from the origin.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Handle for a direct child. Backends call this after resolving `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    /// Handle of the parent directory (`None` for the origin).
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    /// Handle for a file in this directory.
    #[must_use]
    pub fn file(&self, name: &str) -> FileHandle {
        FileHandle {
            dir: self.clone(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for DirHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

/// Handle to a file inside a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle {
    dir: DirHandle,
    name: String,
}

impl FileHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn dir(&self) -> &DirHandle {
        &self.dir
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dir.is_origin() {
            write!(f, "/{}", self.name)
        } else {
            write!(f, "{}/{}", self.dir, self.name)
        }
    }
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A direct child of a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Hierarchical storage operations consumed by the device store.
///
/// Every method suspends only on backend I/O; none holds state across calls
/// besides what the backend persists.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend identifier for logs (`memory`, `fs`, `sqlite`).
    fn kind(&self) -> &'static str;

    /// Resolve (and optionally create) a child directory.
    async fn get_directory(&self, parent: &DirHandle, name: &str, create: bool)
    -> Result<DirHandle>;

    /// Resolve (and optionally create, empty) a file.
    async fn get_file(&self, parent: &DirHandle, name: &str, create: bool) -> Result<FileHandle>;

    /// Read a file's full content.
    async fn read_file(&self, file: &FileHandle) -> Result<Vec<u8>>;

    /// Size of a file in bytes.
    async fn file_size(&self, file: &FileHandle) -> Result<u64>;

    /// Replace a file's content atomically.
    async fn write_file(&self, file: &FileHandle, data: &[u8]) -> Result<()>;

    /// List direct children, sorted by name.
    async fn entries(&self, dir: &DirHandle) -> Result<Vec<DirEntry>>;

    /// Remove a child entry.
    async fn remove_entry(&self, parent: &DirHandle, name: &str, recursive: bool) -> Result<()>;
}

/// Shared, type-erased backend.
pub type SharedBackend = Arc<dyn StorageBackend>;

/// Reject names that are not a single, plain path component.
pub fn validate_entry_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name == "." || name == ".." {
        "name is a relative path component"
    } else if name.contains(['/', '\\']) {
        "name contains a path separator"
    } else if name.contains('\0') {
        "name contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Error for a missing child of `parent`.
pub(crate) fn not_found(parent: &DirHandle, name: &str) -> StoreError {
    StoreError::EntryNotFound {
        path: parent.file(name).to_string(),
    }
}
