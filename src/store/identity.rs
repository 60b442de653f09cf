//! Per-client identifier.
//!
//! A v4 UUID is generated on first use and persisted in a `device_id` file
//! at the backend origin, outside the root namespace. The identifier is the
//! UUID's first 8 hex digits read as a `u32`.

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::storage::{DirHandle, StorageBackend};

/// File holding the persisted UUID.
pub(crate) const DEVICE_ID_FILE: &str = "device_id";

/// Truncate a UUID string to its first 32 bits.
fn truncate_id(raw: &str) -> Option<u32> {
    let prefix = raw.get(..8)?;
    u32::from_str_radix(prefix, 16).ok()
}

pub(super) async fn load_or_create(backend: &dyn StorageBackend) -> Result<u32> {
    let file = backend
        .get_file(&DirHandle::origin(), DEVICE_ID_FILE, true)
        .await?;
    let stored = backend.read_file(&file).await?;
    let stored = String::from_utf8_lossy(&stored).trim().to_string();

    let (raw, id) = match truncate_id(&stored) {
        Some(id) => (stored, id),
        None => {
            if !stored.is_empty() {
                warn!(stored = %stored, "Stored client id is unparseable, regenerating");
            }
            let fresh = Uuid::new_v4().hyphenated().to_string();
            backend.write_file(&file, fresh.as_bytes()).await?;
            let id = truncate_id(&fresh).unwrap_or_default();
            (fresh, id)
        }
    };

    info!("This computer ID is [0x{id:x}] parsed from [{raw}]");
    Ok(id)
}
