//! SQLite persistence.
//!
//! Raw SQL with rusqlite, no ORM. One connection is opened at startup and
//! shared behind an async mutex; every row update is a single-statement
//! read-modify-write, so no cross-row transactions are needed.

pub mod integrations;
pub mod meetings;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use integrations::{IntegrationRecord, IntegrationRepository, IntegrationSettings};
pub use meetings::{MeetingRecord, MeetingRepository, NewMeeting};

/// Shared database handle, cloneable into API handlers and the pipeline.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open (and migrate) the database at the default data-dir location.
    pub fn open() -> Result<Self> {
        let db_path = crate::global::db_file()?;

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(&db_path).context("Failed to open database connection")?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection.
    pub async fn with<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().await;
        f(&conn)
    }
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meetings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            date TEXT NOT NULL,
            duration TEXT,
            participants TEXT,
            audio_path TEXT,
            transcription TEXT,
            summary TEXT,
            key_decisions TEXT,
            action_items TEXT,
            status TEXT NOT NULL DEFAULT 'uploading',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create meetings table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meetings_owner_created
         ON meetings(owner_id, created_at DESC)",
        [],
    )
    .context("Failed to create meetings owner index")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meetings_status ON meetings(status)",
        [],
    )
    .context("Failed to create meetings status index")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS integrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            type TEXT NOT NULL,
            settings TEXT NOT NULL,
            is_enabled INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create integrations table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_integrations_owner
         ON integrations(owner_id, created_at DESC)",
        [],
    )
    .context("Failed to create integrations owner index")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' \
                 AND name IN ('meetings', 'integrations')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
    }

    #[tokio::test]
    async fn test_db_handle_with() {
        let db = Db::open_in_memory().unwrap();
        let count = db
            .with(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM meetings", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
