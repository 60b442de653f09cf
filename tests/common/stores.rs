//! Device stores over every backend, for running one scenario against each.

use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

use pilot_bridge::storage::{FsBackend, MemoryBackend, SharedBackend, SqliteBackend};
use pilot_bridge::store::DeviceStore;
use tempfile::TempDir;

/// Backend flavor under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Memory,
    Fs,
    Sqlite,
}

pub const ALL_FLAVORS: [Flavor; 3] = [Flavor::Memory, Flavor::Fs, Flavor::Sqlite];

/// A store plus whatever on-disk state backs it.
pub struct TestStore {
    pub flavor: Flavor,
    store: DeviceStore,
    temp: TempDir,
}

impl TestStore {
    pub fn new(flavor: Flavor) -> Self {
        let temp = TempDir::new().unwrap();
        let store = DeviceStore::new(open_backend(flavor, &temp));
        Self {
            flavor,
            store,
            temp,
        }
    }

    /// A second store over the same persisted state, as a new process
    /// would see it. Memory stores start empty.
    pub fn reopen(&self) -> DeviceStore {
        DeviceStore::new(open_backend(self.flavor, &self.temp))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.temp.path().to_path_buf()
    }
}

impl Deref for TestStore {
    type Target = DeviceStore;

    fn deref(&self) -> &DeviceStore {
        &self.store
    }
}

fn open_backend(flavor: Flavor, temp: &TempDir) -> SharedBackend {
    match flavor {
        Flavor::Memory => Arc::new(MemoryBackend::new()),
        Flavor::Fs => Arc::new(FsBackend::open(temp.path().join("tree")).unwrap()),
        Flavor::Sqlite => Arc::new(SqliteBackend::open(temp.path().join("store.db")).unwrap()),
    }
}
