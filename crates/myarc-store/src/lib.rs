//! Primary document store for MyArc over SQLite.
//!
//! Each operation opens a fresh WAL connection with a busy timeout, so there
//! is no shared in-process mutable state between requests; concurrency safety
//! rests on SQLite's per-statement atomicity plus owner-scoped predicates.
//! Every read and write filters on the owning user id — a client-supplied
//! entry id alone is never trusted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;

mod entries;
mod pending_uploads;
mod users;

pub use entries::{EntryChanges, EntryListItem, EntryRecord, NewEntry};
pub use pending_uploads::PendingUploadRecord;
pub use users::{ProfileChanges, SettingsChanges, UserRecord, UserSettings};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
/// Errors returned by the document store.
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// SQLite-backed store holding entries, pending uploads, and users.
#[derive(Debug, Clone)]
pub struct JournalDb {
    db_path: PathBuf,
}

impl JournalDb {
    /// Opens (creating if needed) the database at `path` and ensures schema.
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self { db_path };
        let connection = store.open_connection()?;
        store.initialize_schema(&connection)?;
        Ok(store)
    }

    pub(crate) fn open_connection(&self) -> StoreResult<Connection> {
        let connection = Connection::open(&self.db_path)?;
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(connection)
    }

    fn initialize_schema(&self, connection: &Connection) -> StoreResult<()> {
        connection.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NULL,
                api_token TEXT NULL UNIQUE,
                is_onboarded INTEGER NOT NULL DEFAULT 0,
                current_focus TEXT NULL,
                settings_json TEXT NOT NULL,
                created_unix_ms INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS entries (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                preview TEXT NOT NULL,
                tags_json TEXT NOT NULL,
                entry_date_unix_ms INTEGER NOT NULL,
                sentiment TEXT NULL,
                ai_analysis_json TEXT NULL,
                embedding_json TEXT NULL,
                created_unix_ms INTEGER NOT NULL,
                updated_unix_ms INTEGER NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_entries_owner_date
                ON entries (user_id, entry_date_unix_ms);

            CREATE TABLE IF NOT EXISTS pending_uploads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                object_key TEXT NOT NULL,
                created_unix_ms INTEGER NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_pending_uploads_owner ON pending_uploads (user_id);
            CREATE INDEX IF NOT EXISTS idx_pending_uploads_created
                ON pending_uploads (created_unix_ms);
            "#,
        )?;
        Ok(())
    }
}
