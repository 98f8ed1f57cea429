use rusqlite::{OptionalExtension, Result as SqlResult, params};
use std::path::Path;
use std::sync::Mutex;

use super::database::Database;
use super::{SessionKey, SessionStore, StoreError, ensure_parent_dir};

/// Session persisted in SQLite so it survives between CLI invocations
pub struct SessionDatabase {
    db: Mutex<Database>,
}

impl SessionDatabase {
    /// Initialize session database at custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        ensure_parent_dir(&path)?;
        let db = Database::new(path)?;
        Self::from_database(db).map_err(StoreError::from)
    }

    fn from_database(db: Database) -> SqlResult<Self> {
        init_schema(&db)?;
        Ok(Self { db: Mutex::new(db) })
    }
}

fn init_schema(db: &Database) -> SqlResult<()> {
    db.connection().execute(
        "CREATE TABLE IF NOT EXISTS session (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )",
        [],
    )?;
    Ok(())
}

impl SessionStore for SessionDatabase {
    fn get(&self, key: SessionKey) -> Result<Option<String>, StoreError> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        let value = db
            .connection()
            .query_row(
                "SELECT value FROM session WHERE key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<(), StoreError> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        db.connection().execute(
            "INSERT OR REPLACE INTO session (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now'))",
            params![key.as_str(), value],
        )?;
        Ok(())
    }

    fn remove(&self, key: SessionKey) -> Result<(), StoreError> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        db.connection()
            .execute("DELETE FROM session WHERE key = ?1", params![key.as_str()])?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        db.connection().execute("DELETE FROM session", [])?;
        Ok(())
    }
}
