//! OS filesystem storage backend.
//!
//! Maps the handle hierarchy onto a directory on disk. Writes go to a
//! temporary sibling file that is synced and then renamed over the target,
//! so a crash leaves either the old or the new content.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::{
    DirEntry, DirHandle, EntryKind, FileHandle, StorageBackend, not_found, validate_entry_name,
};
use crate::error::{Result, StoreError};

/// Suffix of in-flight temporary files; never listed.
const TMP_SUFFIX: &str = ".pb-tmp";

/// [`StorageBackend`] rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsBackend {
    origin: PathBuf,
}

impl FsBackend {
    /// Open a backend rooted at `origin`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(origin: P) -> Result<Self> {
        let origin = origin.as_ref().to_path_buf();
        std::fs::create_dir_all(&origin).map_err(|e| {
            StoreError::Backend(format!(
                "Failed to create storage directory {}: {e}",
                origin.display()
            ))
        })?;
        debug!(origin = %origin.display(), "Filesystem storage backend ready");
        Ok(Self { origin })
    }

    /// Directory on disk backing the origin handle.
    #[must_use]
    pub fn origin_path(&self) -> &Path {
        &self.origin
    }

    fn dir_path(&self, dir: &DirHandle) -> PathBuf {
        dir.segments()
            .iter()
            .fold(self.origin.clone(), |path, segment| path.join(segment))
    }

    fn file_path(&self, file: &FileHandle) -> PathBuf {
        self.dir_path(file.dir()).join(file.name())
    }

    async fn ensure_dir(&self, dir: &DirHandle) -> Result<PathBuf> {
        let path = self.dir_path(dir);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(path),
            Ok(_) => Err(StoreError::Backend(format!("{dir} is a file"))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::EntryNotFound {
                path: dir.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

fn map_io(err: io::Error, parent: &DirHandle, name: &str) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        not_found(parent, name)
    } else {
        StoreError::Io(err)
    }
}

#[async_trait]
impl StorageBackend for FsBackend {
    fn kind(&self) -> &'static str {
        "fs"
    }

    async fn get_directory(
        &self,
        parent: &DirHandle,
        name: &str,
        create: bool,
    ) -> Result<DirHandle> {
        validate_entry_name(name)?;
        let path = self.ensure_dir(parent).await?.join(name);
        trace!(path = %path.display(), create, "Resolving directory");

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(StoreError::Backend(format!(
                    "{} is a file, not a directory",
                    parent.file(name)
                )));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && create => {
                match fs::create_dir(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                    Err(e) => return Err(map_io(e, parent, name)),
                }
            }
            Err(e) => return Err(map_io(e, parent, name)),
        }
        Ok(parent.child(name))
    }

    async fn get_file(&self, parent: &DirHandle, name: &str, create: bool) -> Result<FileHandle> {
        validate_entry_name(name)?;
        let path = self.ensure_dir(parent).await?.join(name);
        trace!(path = %path.display(), create, "Resolving file");

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(StoreError::Backend(format!(
                    "{} is a directory, not a file",
                    parent.file(name)
                )));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && create => {
                let created = fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .await;
                match created {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                    Err(e) => return Err(map_io(e, parent, name)),
                }
            }
            Err(e) => return Err(map_io(e, parent, name)),
        }
        Ok(parent.file(name))
    }

    async fn read_file(&self, file: &FileHandle) -> Result<Vec<u8>> {
        fs::read(self.file_path(file))
            .await
            .map_err(|e| map_io(e, file.dir(), file.name()))
    }

    async fn file_size(&self, file: &FileHandle) -> Result<u64> {
        let meta = fs::metadata(self.file_path(file))
            .await
            .map_err(|e| map_io(e, file.dir(), file.name()))?;
        Ok(meta.len())
    }

    async fn write_file(&self, file: &FileHandle, data: &[u8]) -> Result<()> {
        let dir = self.ensure_dir(file.dir()).await?;
        let target = dir.join(file.name());
        let tmp = dir.join(format!(".{}.{}{TMP_SUFFIX}", file.name(), Uuid::new_v4().simple()));
        trace!(target = %target.display(), len = data.len(), "Writing file");

        let result = async {
            let mut out = fs::File::create(&tmp).await?;
            out.write_all(data).await?;
            out.sync_all().await?;
            drop(out);
            fs::rename(&tmp, &target).await
        }
        .await;

        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(tmp = %tmp.display(), error = %cleanup, "Failed to remove temp file");
                }
            }
            return Err(map_io(e, file.dir(), file.name()));
        }
        Ok(())
    }

    async fn entries(&self, dir: &DirHandle) -> Result<Vec<DirEntry>> {
        let path = self.ensure_dir(dir).await?;
        let mut reader = fs::read_dir(&path).await?;
        let mut entries = Vec::new();

        while let Some(entry) = reader.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                warn!(dir = %path.display(), "Skipping non UTF-8 entry name");
                continue;
            };
            if name.ends_with(TMP_SUFFIX) {
                continue;
            }
            let kind = if entry.file_type().await?.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(DirEntry::new(name, kind));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn remove_entry(&self, parent: &DirHandle, name: &str, recursive: bool) -> Result<()> {
        validate_entry_name(name)?;
        let path = self.ensure_dir(parent).await?.join(name);
        let meta = fs::symlink_metadata(&path)
            .await
            .map_err(|e| map_io(e, parent, name))?;

        debug!(path = %path.display(), recursive, "Removing entry");
        let result = if meta.is_dir() {
            if recursive {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_dir(&path).await
            }
        } else {
            fs::remove_file(&path).await
        };
        result.map_err(|e| map_io(e, parent, name))
    }
}
