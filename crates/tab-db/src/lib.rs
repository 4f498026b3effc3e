//! SQLite persistence shared by every tab of an origin.
//!
//! One database file plays the role of the browser's origin-scoped storage:
//! any number of tabs, in one process or several, open the same file and see
//! each other's writes through the [`tab_sync::SharedStore`] implementation.

pub mod schema;
pub mod settings;
pub mod shared;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension};

/// Thread-safe database handle wrapping a single SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        tracing::debug!("Database opened at {}", path.display());
        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.configure()?;
        db.migrate()?;
        Ok(db)
    }

    /// Access the underlying connection with a closure.
    pub fn with_conn<F, R>(&self, f: F) -> Result<R, DbError>
    where
        F: FnOnce(&Connection) -> Result<R, DbError>,
    {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&conn)
    }

    /// Single text value stored under `key`, via a one-parameter `SELECT`.
    pub(crate) fn lookup(&self, sql: &str, key: &str) -> Result<Option<String>, DbError> {
        self.with_conn(|conn| Ok(conn.query_row(sql, [key], |row| row.get(0)).optional()?))
    }

    /// Insert or replace the value under `key`, via a two-parameter upsert.
    pub(crate) fn upsert(&self, sql: &str, key: &str, value: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(sql, [key, value])?;
            Ok(())
        })
    }

    fn configure(&self) -> Result<(), DbError> {
        // WAL lets other processes read the shared keys while one writes.
        self.with_conn(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA busy_timeout=5000;",
            )?;
            Ok(())
        })
    }

    fn migrate(&self) -> Result<(), DbError> {
        self.with_conn(|conn| {
            schema::run_migrations(conn)?;
            Ok(())
        })
    }
}

/// Database error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests;
