//! Migration runner. Tracks the applied schema version in SQLite's
//! built-in `PRAGMA user_version` rather than a dedicated table, since
//! there's exactly one migration chain to replay in order.

mod v001_init;

use rusqlite::Connection;

use mindstore_core::errors::{MindstoreResult, StorageError};

const CURRENT_VERSION: i64 = 1;

pub fn run_migrations(conn: &Connection) -> MindstoreResult<()> {
    let applied: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| StorageError::Sqlite {
            message: e.to_string(),
        })?;

    if applied < 1 {
        v001_init::migrate(conn)?;
    }

    if applied < CURRENT_VERSION {
        conn.pragma_update(None, "user_version", CURRENT_VERSION)
            .map_err(|e| StorageError::Sqlite {
                message: e.to_string(),
            })?;
    }

    Ok(())
}
