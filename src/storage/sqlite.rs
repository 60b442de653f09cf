//! Embedded-database storage backend.
//!
//! Emulates the directory tree inside a single SQLite file: every directory
//! and file is one row keyed by `(parent, name)`, where `parent` is the
//! `/`-joined path of the containing directory (empty for the origin).
//! Entry names never contain `/`, so the key is unambiguous.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument, trace};

use super::{
    DirEntry, DirHandle, EntryKind, FileHandle, StorageBackend, not_found, validate_entry_name,
};
use crate::error::{Result, StoreError};

/// SQLite schema for the entry tree.
const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS entries (
    parent TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('file', 'directory')),
    data BLOB,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (parent, name)
);

CREATE INDEX IF NOT EXISTS idx_entries_parent ON entries(parent);
";

const KIND_FILE: &str = "file";
const KIND_DIR: &str = "directory";

/// [`StorageBackend`] stored in a SQLite database.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend").finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Opens or creates a database at the given path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Backend(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        debug!(path = %path.display(), "Opening storage database");
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Backend(format!("Failed to open database: {e}")))?;

        let backend = Self::from_connection(conn)?;
        info!(path = %path.display(), "Storage database ready");
        Ok(backend)
    }

    /// Creates an in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StoreError::Backend(format!("Failed to create in-memory database: {e}"))
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| StoreError::Backend(format!("Failed to initialize schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".to_string()))
    }
}

fn path_key(dir: &DirHandle) -> String {
    dir.segments().join("/")
}

fn child_key(parent: &DirHandle, name: &str) -> String {
    if parent.is_origin() {
        name.to_string()
    } else {
        format!("{}/{name}", path_key(parent))
    }
}

fn kind_of(conn: &Connection, parent: &DirHandle, name: &str) -> Result<Option<String>> {
    let kind = conn
        .query_row(
            "SELECT kind FROM entries WHERE parent = ?1 AND name = ?2",
            params![path_key(parent), name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(kind)
}

fn ensure_dir(conn: &Connection, dir: &DirHandle) -> Result<()> {
    let (Some(parent), Some(name)) = (dir.parent(), dir.name()) else {
        return Ok(());
    };
    match kind_of(conn, &parent, name)?.as_deref() {
        Some(KIND_DIR) => Ok(()),
        Some(_) => Err(StoreError::Backend(format!("{dir} is a file"))),
        None => Err(StoreError::EntryNotFound {
            path: dir.to_string(),
        }),
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    async fn get_directory(
        &self,
        parent: &DirHandle,
        name: &str,
        create: bool,
    ) -> Result<DirHandle> {
        validate_entry_name(name)?;
        let conn = self.conn()?;
        ensure_dir(&conn, parent)?;

        match kind_of(&conn, parent, name)?.as_deref() {
            Some(KIND_DIR) => {}
            Some(_) => {
                return Err(StoreError::Backend(format!(
                    "{} is a file, not a directory",
                    parent.file(name)
                )));
            }
            None if create => {
                trace!(parent = %parent, name, "Creating directory row");
                conn.execute(
                    "INSERT INTO entries (parent, name, kind, data, updated_at)
                     VALUES (?1, ?2, ?3, NULL, ?4)",
                    params![path_key(parent), name, KIND_DIR, Utc::now().to_rfc3339()],
                )?;
            }
            None => return Err(not_found(parent, name)),
        }
        Ok(parent.child(name))
    }

    async fn get_file(&self, parent: &DirHandle, name: &str, create: bool) -> Result<FileHandle> {
        validate_entry_name(name)?;
        let conn = self.conn()?;
        ensure_dir(&conn, parent)?;

        match kind_of(&conn, parent, name)?.as_deref() {
            Some(KIND_FILE) => {}
            Some(_) => {
                return Err(StoreError::Backend(format!(
                    "{} is a directory, not a file",
                    parent.file(name)
                )));
            }
            None if create => {
                trace!(parent = %parent, name, "Creating file row");
                conn.execute(
                    "INSERT INTO entries (parent, name, kind, data, updated_at)
                     VALUES (?1, ?2, ?3, x'', ?4)",
                    params![path_key(parent), name, KIND_FILE, Utc::now().to_rfc3339()],
                )?;
            }
            None => return Err(not_found(parent, name)),
        }
        Ok(parent.file(name))
    }

    async fn read_file(&self, file: &FileHandle) -> Result<Vec<u8>> {
        let conn = self.conn()?;
        let data: Option<Vec<u8>> = conn
            .query_row(
                "SELECT data FROM entries WHERE parent = ?1 AND name = ?2 AND kind = ?3",
                params![path_key(file.dir()), file.name(), KIND_FILE],
                |row| row.get(0),
            )
            .optional()?;
        data.ok_or_else(|| not_found(file.dir(), file.name()))
    }

    async fn file_size(&self, file: &FileHandle) -> Result<u64> {
        let conn = self.conn()?;
        let size: Option<i64> = conn
            .query_row(
                "SELECT length(data) FROM entries WHERE parent = ?1 AND name = ?2 AND kind = ?3",
                params![path_key(file.dir()), file.name(), KIND_FILE],
                |row| row.get(0),
            )
            .optional()?;
        size.map(|s| u64::try_from(s).unwrap_or(0))
            .ok_or_else(|| not_found(file.dir(), file.name()))
    }

    async fn write_file(&self, file: &FileHandle, data: &[u8]) -> Result<()> {
        let conn = self.conn()?;
        ensure_dir(&conn, file.dir())?;
        if kind_of(&conn, file.dir(), file.name())?.as_deref() == Some(KIND_DIR) {
            return Err(StoreError::Backend(format!("{file} is a directory")));
        }

        trace!(file = %file, len = data.len(), "Writing file row");
        conn.execute(
            "INSERT INTO entries (parent, name, kind, data, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(parent, name) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at",
            params![
                path_key(file.dir()),
                file.name(),
                KIND_FILE,
                data,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    async fn entries(&self, dir: &DirHandle) -> Result<Vec<DirEntry>> {
        let conn = self.conn()?;
        ensure_dir(&conn, dir)?;

        let mut stmt =
            conn.prepare("SELECT name, kind FROM entries WHERE parent = ?1 ORDER BY name")?;
        let rows = stmt.query_map(params![path_key(dir)], |row| {
            let name: String = row.get(0)?;
            let kind: String = row.get(1)?;
            Ok((name, kind))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (name, kind) = row?;
            let kind = if kind == KIND_DIR {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(DirEntry::new(name, kind));
        }
        Ok(entries)
    }

    async fn remove_entry(&self, parent: &DirHandle, name: &str, recursive: bool) -> Result<()> {
        validate_entry_name(name)?;
        let mut conn = self.conn()?;

        let Some(kind) = kind_of(&conn, parent, name)? else {
            return Err(not_found(parent, name));
        };
        let full = child_key(parent, name);

        if kind == KIND_DIR {
            let has_children: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM entries
                 WHERE parent = ?1 OR substr(parent, 1, length(?1) + 1) = ?1 || '/')",
                params![full],
                |row| row.get(0),
            )?;
            if has_children && !recursive {
                return Err(StoreError::Backend(format!(
                    "{} is not empty",
                    parent.child(name)
                )));
            }
        }

        debug!(path = %full, recursive, "Removing entry rows");
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM entries WHERE parent = ?1 AND name = ?2",
            params![path_key(parent), name],
        )?;
        if kind == KIND_DIR {
            tx.execute(
                "DELETE FROM entries
                 WHERE parent = ?1 OR substr(parent, 1, length(?1) + 1) = ?1 || '/'",
                params![full],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
