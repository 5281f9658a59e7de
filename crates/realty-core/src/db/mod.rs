//! SQLite database layer for flow persistence.
//!
//! Uses rusqlite with WAL mode. All database operations from async code go
//! through `tokio::task::spawn_blocking` to avoid blocking the runtime.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::RealtyError;

/// Thread-safe handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, RealtyError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| RealtyError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| RealtyError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize_tables()?;

        tracing::info!("[Database] SQLite database opened at: {}", db_path.display());
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, RealtyError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RealtyError::Database(format!("Failed to open in-memory db: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize_tables()?;
        Ok(db)
    }

    /// Execute a closure with access to the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, RealtyError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RealtyError::Database(format!("Lock poisoned: {}", e)))?;
        f(&conn).map_err(|e| RealtyError::Database(e.to_string()))
    }

    /// Execute a closure with access to the database connection (async-friendly).
    pub async fn with_conn_async<F, T>(&self, f: F) -> Result<T, RealtyError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| RealtyError::Database(format!("Task join error: {}", e)))?
    }

    fn initialize_tables(&self) -> Result<(), RealtyError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS flows (
                    id              TEXT PRIMARY KEY,
                    phase           TEXT NOT NULL DEFAULT 'pending',
                    state           TEXT NOT NULL DEFAULT '{}',
                    created_at      INTEGER NOT NULL,
                    updated_at      INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_flows_phase ON flows(phase);
                CREATE INDEX IF NOT EXISTS idx_flows_updated ON flows(updated_at);
                ",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_parent_dirs_and_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/realty.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());

        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'flows'",
                    [],
                    |row| row.get(0),
                )
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_with_conn_async_maps_errors() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .with_conn_async(|conn| conn.execute("INSERT INTO missing_table VALUES (1)", []))
            .await
            .unwrap_err();
        assert!(matches!(err, RealtyError::Database(_)));
    }
}
