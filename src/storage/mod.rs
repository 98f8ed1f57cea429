pub mod database;
pub mod memory;
pub mod models;
pub mod session_db;

pub use memory::MemorySessionStore;
pub use models::SessionKey;
pub use session_db::SessionDatabase;

use std::fs;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("session store lock poisoned")]
    Poisoned,
}

/// Key/value cache backing the client session.
///
/// Lifecycle: created empty on first use, filled by login and the CSRF
/// handshake, emptied by logout.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: SessionKey) -> Result<Option<String>, StoreError>;

    fn set(&self, key: SessionKey, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: SessionKey) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError> {
        for key in SessionKey::ALL {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Ensure the parent directory of a data file exists
pub fn ensure_parent_dir<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
