//! In-memory storage backend.
//!
//! Keeps the whole tree in a map keyed by path. Used by tests and by the
//! `memory` backend setting; nothing survives the process.
//!
//! Besides the [`StorageBackend`] contract it records every mutating
//! operation and supports one-shot error injection, so store tests can
//! assert what was written and simulate backend faults.
//!
//! ```rust,ignore
//! let backend = Arc::new(MemoryBackend::new());
//! backend.inject_error(StoreError::Backend("quota exceeded".into()));
//! assert!(store.write_database("alice", &db).await.is_err());
//! ```

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, trace};

use super::{
    DirEntry, DirHandle, EntryKind, FileHandle, StorageBackend, not_found, validate_entry_name,
};
use crate::error::{Result, StoreError};

/// Recorded mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateDirectory { path: String },
    CreateFile { path: String },
    Write { path: String, len: usize },
    Remove { path: String, recursive: bool },
}

#[derive(Debug, Clone)]
enum Node {
    Directory,
    File(Vec<u8>),
}

type Key = Vec<String>;

/// Map-backed [`StorageBackend`].
#[derive(Debug, Default)]
pub struct MemoryBackend {
    nodes: Mutex<BTreeMap<Key, Node>>,
    operation_log: Mutex<Vec<Operation>>,
    error_injection: Mutex<Option<StoreError>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        debug!("Creating in-memory storage backend");
        Self::default()
    }

    /// Fail the next backend call with `error`.
    pub fn inject_error(&self, error: StoreError) {
        if let Ok(mut slot) = self.error_injection.lock() {
            *slot = Some(error);
        }
    }

    /// All mutating operations performed so far.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.operation_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Total bytes held in files.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.nodes
            .lock()
            .map(|nodes| {
                nodes
                    .values()
                    .map(|n| match n {
                        Node::File(data) => data.len(),
                        Node::Directory => 0,
                    })
                    .sum()
            })
            .unwrap_or(0)
    }

    // === Internal Helpers ===

    fn nodes(&self) -> Result<MutexGuard<'_, BTreeMap<Key, Node>>> {
        self.nodes
            .lock()
            .map_err(|_| StoreError::Backend("memory backend lock poisoned".to_string()))
    }

    fn check_error(&self) -> Result<()> {
        let injected = self
            .error_injection
            .lock()
            .map_err(|_| StoreError::Backend("memory backend lock poisoned".to_string()))?
            .take();
        match injected {
            Some(error) => {
                debug!(%error, "Returning injected error");
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn record_op(&self, op: Operation) {
        trace!(?op, "Recording operation");
        if let Ok(mut log) = self.operation_log.lock() {
            log.push(op);
        }
    }
}

fn key_of(dir: &DirHandle) -> Key {
    dir.segments().to_vec()
}

fn child_key(dir: &DirHandle, name: &str) -> Key {
    let mut key = key_of(dir);
    key.push(name.to_string());
    key
}

fn ensure_dir(nodes: &BTreeMap<Key, Node>, dir: &DirHandle) -> Result<()> {
    if dir.is_origin() {
        return Ok(());
    }
    match nodes.get(dir.segments()) {
        Some(Node::Directory) => Ok(()),
        Some(Node::File(_)) => Err(StoreError::Backend(format!("{dir} is a file"))),
        None => Err(StoreError::EntryNotFound {
            path: dir.to_string(),
        }),
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get_directory(
        &self,
        parent: &DirHandle,
        name: &str,
        create: bool,
    ) -> Result<DirHandle> {
        validate_entry_name(name)?;
        self.check_error()?;
        let mut nodes = self.nodes()?;
        ensure_dir(&nodes, parent)?;

        let key = child_key(parent, name);
        match nodes.get(&key) {
            Some(Node::Directory) => {}
            Some(Node::File(_)) => {
                return Err(StoreError::Backend(format!(
                    "{} is a file, not a directory",
                    parent.file(name)
                )));
            }
            None if create => {
                nodes.insert(key, Node::Directory);
                drop(nodes);
                self.record_op(Operation::CreateDirectory {
                    path: parent.child(name).to_string(),
                });
            }
            None => return Err(not_found(parent, name)),
        }
        Ok(parent.child(name))
    }

    async fn get_file(&self, parent: &DirHandle, name: &str, create: bool) -> Result<FileHandle> {
        validate_entry_name(name)?;
        self.check_error()?;
        let mut nodes = self.nodes()?;
        ensure_dir(&nodes, parent)?;

        let key = child_key(parent, name);
        match nodes.get(&key) {
            Some(Node::File(_)) => {}
            Some(Node::Directory) => {
                return Err(StoreError::Backend(format!(
                    "{} is a directory, not a file",
                    parent.file(name)
                )));
            }
            None if create => {
                nodes.insert(key, Node::File(Vec::new()));
                drop(nodes);
                self.record_op(Operation::CreateFile {
                    path: parent.file(name).to_string(),
                });
            }
            None => return Err(not_found(parent, name)),
        }
        Ok(parent.file(name))
    }

    async fn read_file(&self, file: &FileHandle) -> Result<Vec<u8>> {
        self.check_error()?;
        let nodes = self.nodes()?;
        match nodes.get(&child_key(file.dir(), file.name())) {
            Some(Node::File(data)) => Ok(data.clone()),
            _ => Err(not_found(file.dir(), file.name())),
        }
    }

    async fn file_size(&self, file: &FileHandle) -> Result<u64> {
        self.check_error()?;
        let nodes = self.nodes()?;
        match nodes.get(&child_key(file.dir(), file.name())) {
            Some(Node::File(data)) => Ok(data.len() as u64),
            _ => Err(not_found(file.dir(), file.name())),
        }
    }

    async fn write_file(&self, file: &FileHandle, data: &[u8]) -> Result<()> {
        self.check_error()?;
        let mut nodes = self.nodes()?;
        ensure_dir(&nodes, file.dir())?;

        let key = child_key(file.dir(), file.name());
        if let Some(Node::Directory) = nodes.get(&key) {
            return Err(StoreError::Backend(format!("{file} is a directory")));
        }
        nodes.insert(key, Node::File(data.to_vec()));
        drop(nodes);
        self.record_op(Operation::Write {
            path: file.to_string(),
            len: data.len(),
        });
        Ok(())
    }

    async fn entries(&self, dir: &DirHandle) -> Result<Vec<DirEntry>> {
        self.check_error()?;
        let nodes = self.nodes()?;
        ensure_dir(&nodes, dir)?;

        let depth = dir.segments().len();
        let entries = nodes
            .iter()
            .filter(|(key, _)| key.len() == depth + 1 && key.starts_with(dir.segments()))
            .map(|(key, node)| {
                let kind = match node {
                    Node::Directory => EntryKind::Directory,
                    Node::File(_) => EntryKind::File,
                };
                DirEntry::new(key[depth].clone(), kind)
            })
            .collect();
        Ok(entries)
    }

    async fn remove_entry(&self, parent: &DirHandle, name: &str, recursive: bool) -> Result<()> {
        validate_entry_name(name)?;
        self.check_error()?;
        let mut nodes = self.nodes()?;

        let key = child_key(parent, name);
        let has_children = nodes
            .keys()
            .any(|k| k.len() > key.len() && k.starts_with(&key));
        match nodes.get(&key) {
            None => return Err(not_found(parent, name)),
            Some(Node::Directory) if has_children && !recursive => {
                return Err(StoreError::Backend(format!(
                    "{} is not empty",
                    parent.child(name)
                )));
            }
            Some(_) => {}
        }
        nodes.retain(|k, _| !k.starts_with(&key));
        drop(nodes);
        self.record_op(Operation::Remove {
            path: parent.file(name).to_string(),
            recursive,
        });
        Ok(())
    }
}
