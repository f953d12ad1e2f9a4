//! PRAGMA configuration applied to every SQLite connection.
//!
//! WAL mode, NORMAL sync, 256MB mmap, 64MB cache, configurable busy
//! timeout, foreign keys on.

use rusqlite::Connection;

use mindstore_core::errors::{MindstoreResult, StorageError};

pub fn apply_pragmas(conn: &Connection, busy_timeout_ms: u64) -> MindstoreResult<()> {
    conn.execute_batch(&format!(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA mmap_size = 268435456;
        PRAGMA cache_size = -64000;
        PRAGMA busy_timeout = {busy_timeout_ms};
        PRAGMA foreign_keys = ON;
        "
    ))
    .map_err(|e| StorageError::Sqlite {
        message: e.to_string(),
    })?;
    Ok(())
}

pub fn apply_read_pragmas(conn: &Connection, busy_timeout_ms: u64) -> MindstoreResult<()> {
    conn.execute_batch(&format!(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA mmap_size = 268435456;
        PRAGMA busy_timeout = {busy_timeout_ms};
        "
    ))
    .map_err(|e| StorageError::Sqlite {
        message: e.to_string(),
    })?;
    Ok(())
}

pub fn verify_wal_mode(conn: &Connection) -> MindstoreResult<bool> {
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(|e| StorageError::Sqlite {
            message: e.to_string(),
        })?;
    Ok(mode.eq_ignore_ascii_case("wal"))
}
