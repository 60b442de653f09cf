//! Whole-store export and import as a ZIP archive.
//!
//! Archive paths mirror the backend tree below the origin:
//! `<root>/<device>/<partition>/<file>`. Directories get their own entries so
//! empty partitions survive a round trip.

use std::collections::{BTreeSet, VecDeque};
use std::io::{Cursor, Read, Write};

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::DeviceStore;
use crate::error::{Result, StoreError};
use crate::storage::{DirHandle, validate_entry_name};

/// Result of an archive import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Device namespaces present after the import.
    pub devices: usize,
    /// Files written.
    pub files: usize,
}

/// Suggested file name for an export taken at `now`.
pub fn default_archive_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("pilot-bridge-backup_{}.zip", now.format("%Y-%m-%d_%H_%M_%S"))
}

enum ArchiveItem {
    Directory(Vec<String>),
    File(Vec<String>, Vec<u8>),
}

impl DeviceStore {
    /// Zip every device namespace under the root.
    pub async fn export_archive(&self) -> Result<Vec<u8>> {
        let root = self.root_dir().await?;
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut pending = VecDeque::from([root]);
        let mut files = 0usize;
        while let Some(dir) = pending.pop_front() {
            let prefix = dir.segments().join("/");
            zip.add_directory(format!("{prefix}/"), options)?;

            for entry in self.backend.entries(&dir).await? {
                if entry.is_dir() {
                    pending.push_back(dir.child(&entry.name));
                    continue;
                }
                let bytes = self.backend.read_file(&dir.file(&entry.name)).await?;
                zip.start_file(format!("{prefix}/{}", entry.name), options)?;
                zip.write_all(&bytes)?;
                files += 1;
            }
        }

        let bytes = zip.finish()?.into_inner();
        info!(files, size = bytes.len(), "Exported storage archive");
        Ok(bytes)
    }

    /// Replace the root namespace's contents with an archive's.
    ///
    /// Every entry is read and validated before anything is deleted, so a
    /// corrupt archive leaves the store untouched. A backend failure after
    /// validation is not rolled back and leaves the root partly restored.
    ///
    /// Each imported device gets both partitions, whether or not the archive
    /// carries directory entries for them.
    pub async fn import_archive(&self, bytes: &[u8]) -> Result<ImportSummary> {
        let items = self.read_archive(bytes)?;

        let root = self.root_dir().await?;
        for entry in self.backend.entries(&root).await? {
            self.backend.remove_entry(&root, &entry.name, true).await?;
        }
        debug!("Cleared root namespace for import");

        let mut summary = ImportSummary::default();
        for item in items {
            match item {
                ArchiveItem::Directory(path) => {
                    self.ensure_path(&root, &path).await?;
                }
                ArchiveItem::File(path, data) => {
                    let Some((name, parents)) = path.split_last() else {
                        continue;
                    };
                    let dir = self.ensure_path(&root, parents).await?;
                    let file = self.backend.get_file(&dir, name, true).await?;
                    self.backend.write_file(&file, &data).await?;
                    summary.files += 1;
                }
            }
        }

        let devices = self.list_devices().await?;
        for device in &devices {
            self.create_device(device).await?;
        }
        summary.devices = devices.len();
        info!(
            devices = summary.devices,
            files = summary.files,
            "Imported storage archive"
        );
        Ok(summary)
    }

    async fn ensure_path(&self, base: &DirHandle, path: &[String]) -> Result<DirHandle> {
        let mut dir = base.clone();
        for segment in path {
            dir = self.backend.get_directory(&dir, segment, true).await?;
        }
        Ok(dir)
    }

    /// Decode and validate archive entries, paths relative to the root.
    fn read_archive(&self, bytes: &[u8]) -> Result<Vec<ArchiveItem>> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| StoreError::Archive(format!("Invalid ZIP archive: {e}")))?;

        let mut items = Vec::new();
        let mut seen_files = BTreeSet::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let raw_name = file.name().to_string();
            let is_dir = file.is_dir();

            let mut parts: Vec<String> = raw_name
                .split('/')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            if parts.first().map(String::as_str) != Some(self.root_name.as_str()) {
                warn!(entry = %raw_name, "Skipping archive entry outside the root namespace");
                continue;
            }
            parts.remove(0);

            for part in &parts {
                validate_entry_name(part).map_err(|e| {
                    StoreError::Archive(format!("Bad path {raw_name:?} in archive: {e}"))
                })?;
            }

            if is_dir {
                if !parts.is_empty() {
                    items.push(ArchiveItem::Directory(parts));
                }
                continue;
            }
            if parts.is_empty() {
                return Err(StoreError::Archive(format!(
                    "File entry {raw_name:?} names the root namespace itself"
                )));
            }
            if !seen_files.insert(parts.clone()) {
                return Err(StoreError::Archive(format!(
                    "Duplicate file entry {raw_name:?}"
                )));
            }

            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| StoreError::Archive(format!("Failed to read {raw_name}: {e}")))?;
            items.push(ArchiveItem::File(parts, data));
        }
        Ok(items)
    }
}
