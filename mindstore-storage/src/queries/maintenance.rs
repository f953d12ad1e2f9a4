use rusqlite::Connection;

use mindstore_core::errors::{MindstoreResult, StorageError};

pub fn vacuum(conn: &Connection) -> MindstoreResult<()> {
    conn.execute_batch("VACUUM;").map_err(|e| StorageError::Sqlite {
        message: e.to_string(),
    })?;
    Ok(())
}
