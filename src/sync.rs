//! Persistence contract consumed by a HotSync engine.
//!
//! The engine only knows devices by username and databases by name; it never
//! sees partitions or backends. [`DeviceStore`] implements the contract, so an
//! engine can hold an `Arc<dyn DatabaseStorage>`.

use async_trait::async_trait;

use crate::error::Result;
use crate::pdb::Database;
use crate::store::DeviceStore;

/// Storage operations used during a sync session.
#[async_trait]
pub trait DatabaseStorage: Send + Sync {
    /// Stable identifier the engine writes into the handheld's sync records.
    async fn computer_id(&self) -> Result<u32>;

    async fn create_user(&self, user: &str) -> Result<()>;

    async fn user_exists(&self, user: &str) -> Result<bool>;

    /// Store a full database under its header-derived name.
    async fn write_database(&self, user: &str, db: &Database) -> Result<()>;

    /// Store raw bytes under an explicit name.
    async fn write_database_buffer(&self, user: &str, db_name: &str, bytes: &[u8]) -> Result<()>;

    async fn read_database(&self, user: &str, db_name: &str) -> Result<Database>;

    async fn database_buffer(&self, user: &str, db_name: &str) -> Result<Vec<u8>>;

    async fn database_exists(&self, user: &str, db_name: &str) -> Result<bool>;

    async fn all_databases(&self, user: &str) -> Result<Vec<Database>>;
}

#[async_trait]
impl DatabaseStorage for DeviceStore {
    async fn computer_id(&self) -> Result<u32> {
        Self::computer_id(self).await
    }

    async fn create_user(&self, user: &str) -> Result<()> {
        self.create_device(user).await
    }

    async fn user_exists(&self, user: &str) -> Result<bool> {
        self.device_exists(user).await
    }

    async fn write_database(&self, user: &str, db: &Database) -> Result<()> {
        Self::write_database(self, user, db).await.map(|_| ())
    }

    async fn write_database_buffer(&self, user: &str, db_name: &str, bytes: &[u8]) -> Result<()> {
        Self::write_database_buffer(self, user, db_name, bytes).await
    }

    async fn read_database(&self, user: &str, db_name: &str) -> Result<Database> {
        Self::read_database(self, user, db_name).await
    }

    async fn database_buffer(&self, user: &str, db_name: &str) -> Result<Vec<u8>> {
        self.read_database_buffer(user, db_name).await
    }

    async fn database_exists(&self, user: &str, db_name: &str) -> Result<bool> {
        Self::database_exists(self, user, db_name).await
    }

    async fn all_databases(&self, user: &str) -> Result<Vec<Database>> {
        self.list_all_databases(user).await
    }
}
