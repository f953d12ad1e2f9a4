//! Connection pool managing the single write connection and the read pool.

pub mod pragmas;
pub mod read_pool;
pub mod write_connection;

use std::path::{Path, PathBuf};

use mindstore_core::constants::DEFAULT_POOL_SIZE;
use mindstore_core::errors::MindstoreResult;

pub use read_pool::ReadPool;
pub use write_connection::WriteConnection;

pub struct ConnectionPool {
    pub writer: WriteConnection,
    pub readers: ReadPool,
    pub db_path: Option<PathBuf>,
}

impl ConnectionPool {
    pub fn open(path: &Path, busy_timeout_ms: u64) -> MindstoreResult<Self> {
        let writer = WriteConnection::open(path, busy_timeout_ms)?;
        let readers = ReadPool::open(path, DEFAULT_POOL_SIZE, busy_timeout_ms)?;
        Ok(Self {
            writer,
            readers,
            db_path: Some(path.to_path_buf()),
        })
    }

    /// In-memory mode: readers are isolated databases, so all reads route
    /// through the writer instead (see `EmbeddedBackend::use_read_pool`).
    pub fn open_in_memory() -> MindstoreResult<Self> {
        let writer = WriteConnection::open_in_memory()?;
        let readers = ReadPool::open_in_memory(1)?;
        Ok(Self {
            writer,
            readers,
            db_path: None,
        })
    }
}
