// SQLite database setup and migrations
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database lock poisoned")]
    LockPoisoned,
    #[error("Database handle is still shared and cannot be closed")]
    Closed,
    #[error("Invalid stored value in column {column}: {message}")]
    InvalidRow { column: &'static str, message: String },
}

pub type DbResult<T> = Result<T, DbError>;

// Thread-safe database connection wrapper
pub struct DbConnection {
    conn: Arc<Mutex<Connection>>,
}

impl DbConnection {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`. On `Err` (or a panic) the transaction is
    /// dropped, which rolls it back, and the lock is released with the guard.
    pub fn transaction<T, F>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> DbResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Close the underlying connection.
    ///
    /// Fails with `DbError::Closed` while other clones of the handle are alive.
    pub fn close(self) -> DbResult<()> {
        let mutex = Arc::try_unwrap(self.conn).map_err(|_| DbError::Closed)?;
        let conn = mutex.into_inner().map_err(|_| DbError::LockPoisoned)?;
        conn.close().map_err(|(_, e)| DbError::Sqlite(e))
    }
}

impl Clone for DbConnection {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

/// Open (or create) the database at `db_path` and bring its schema up to date
pub fn open_db(db_path: &Path) -> DbResult<DbConnection> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;
    run_migrations(&conn)?;

    log::debug!("Opened database at {}", db_path.display());
    Ok(DbConnection::new(conn))
}

/// In-memory database with the current schema
pub fn open_in_memory() -> DbResult<DbConnection> {
    let conn = Connection::open_in_memory()?;
    run_migrations(&conn)?;
    Ok(DbConnection::new(conn))
}

fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current_version < 1 {
        migration_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [1])?;
        log::info!("Applied schema migration v1");
    }

    Ok(())
}

fn migration_v1(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS diseases (
            id TEXT PRIMARY KEY,
            tree_disease_name TEXT NOT NULL,
            date_taken TEXT NOT NULL,
            image_path TEXT NOT NULL,
            image_sha256 TEXT NOT NULL,
            image_bytes INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_diseases_date_taken ON diseases(date_taken)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_init() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let table_count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = 'diseases'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(table_count, 1);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i32 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = open_in_memory().unwrap();

        let result: DbResult<()> = db.transaction(|tx| {
            tx.execute(
                "INSERT INTO diseases (id, tree_disease_name, date_taken, image_path, image_sha256, image_bytes)
                 VALUES ('a', 'Black Sigatoka', '2024-01-01T00:00:00Z', '/tmp/a.jpg', '', 0)",
                [],
            )?;
            Err(DbError::LockPoisoned)
        });
        assert!(result.is_err());

        let count: i32 = db
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM diseases", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_close_requires_sole_owner() {
        let db = open_in_memory().unwrap();
        let other = db.clone();
        assert!(matches!(db.close(), Err(DbError::Closed)));
        other.close().unwrap();
    }

    #[test]
    fn test_open_db_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("drbanana.db");
        let db = open_db(&path).unwrap();
        assert!(path.exists());
        db.close().unwrap();
    }
}
