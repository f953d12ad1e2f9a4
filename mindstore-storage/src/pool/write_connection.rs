//! The single writer connection. SQLite allows only one writer at a time;
//! serializing writes behind a `Mutex` here keeps that guarantee explicit
//! rather than relying on `busy_timeout` retries under contention.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use mindstore_core::errors::{MindstoreResult, StorageError};

use super::pragmas::apply_pragmas;

pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    pub fn open(path: &Path, busy_timeout_ms: u64) -> MindstoreResult<Self> {
        let conn = Connection::open(path).map_err(|e| StorageError::Sqlite {
            message: e.to_string(),
        })?;
        apply_pragmas(&conn, busy_timeout_ms)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> MindstoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::Sqlite {
            message: e.to_string(),
        })?;
        apply_pragmas(&conn, 5000)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a closure against the writer connection, holding the lock for
    /// the duration. Callers open their own transaction inside `f` when
    /// more than one statement must be atomic.
    pub fn with_conn<F, T>(&self, f: F) -> MindstoreResult<T>
    where
        F: FnOnce(&Connection) -> MindstoreResult<T>,
    {
        let guard = self.conn.lock().map_err(|_| StorageError::PoolExhausted { active: 1 })?;
        f(&guard)
    }
}
