//! The top-level package: config-driven wiring of the storage dispatcher
//! (spec.md §6, "Collaborator interfaces exposed"). Resolves a
//! [`MindstoreConfig`] into concrete relational/vector drivers and
//! constructs the [`mindstore_dispatch::Engine`] those drivers back. The
//! CLI, RPC surface, and NAPI bindings that call into this crate are
//! external collaborators (spec.md §1, out of scope) — this crate only
//! exposes the named operations they call.

use std::sync::Arc;

use mindstore_core::config::{BackendKind, MindstoreConfig, VectorKind};
use mindstore_core::errors::ConfigError;
use mindstore_core::traits::vector::VectorIndex;
use mindstore_core::traits::RelationalBackend;
use mindstore_dispatch::Engine;
use mindstore_lexical::LexicalIndex;
use mindstore_storage::{EmbeddedBackend, NetworkedBackend};
use mindstore_vector::{BuiltinVectorIndex, QdrantVectorIndex};

pub use mindstore_core::config;
pub use mindstore_core::errors::{MindstoreError, MindstoreResult};
pub use mindstore_dispatch::{SaveMemoriesBatchResult, SaveMemoryOptions, SaveMemoryResult};

fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    path.to_string()
}

fn postgres_url(cfg: &config::NetworkedSqlConfig) -> Result<String, ConfigError> {
    if let Some(dsn) = &cfg.connection_string {
        return Ok(dsn.clone());
    }
    let host = cfg.host.as_deref().ok_or_else(|| ConfigError::MissingKey {
        key: "storage.networked_sql.host".into(),
    })?;
    let database = cfg.database.as_deref().ok_or_else(|| ConfigError::MissingKey {
        key: "storage.networked_sql.database".into(),
    })?;
    let port = cfg.port.unwrap_or(5432);
    let user = cfg.user.as_deref().unwrap_or("postgres");
    let password = cfg.password.as_deref().unwrap_or("");
    let sslmode = if cfg.ssl { "require" } else { "disable" };
    Ok(format!("postgres://{user}:{password}@{host}:{port}/{database}?sslmode={sslmode}"))
}

/// Opens the relational backend and vector index named by `config.storage`,
/// then assembles the [`Engine`] that routes every operation across them.
/// The two halves are chosen independently (spec.md §4.3/§4.4: "two
/// concrete drivers share one interface" for each), so all four
/// combinations are valid.
pub async fn open(config: MindstoreConfig, project_global: bool) -> MindstoreResult<Engine> {
    let backend: Arc<dyn RelationalBackend> = match config.storage.backend {
        BackendKind::Embedded => {
            let path = if project_global {
                expand_home(&config.storage.embedded.global_path)
            } else {
                config.storage.embedded.path.clone()
            };
            Arc::new(EmbeddedBackend::open(path, config.storage.embedded.busy_timeout_ms)?)
        }
        BackendKind::NetworkedSql => {
            let url = postgres_url(&config.storage.networked_sql).map_err(MindstoreError::from)?;
            let pool_size = config.storage.networked_sql.pool_size.unwrap_or(10);
            Arc::new(NetworkedBackend::connect(&url, pool_size).await?)
        }
    };

    let vectors: Arc<dyn VectorIndex> = match config.storage.vector {
        VectorKind::Builtin => Arc::new(BuiltinVectorIndex::new(backend.clone())),
        VectorKind::External => Arc::new(QdrantVectorIndex::connect(&config.storage.external_vector.url)?),
    };

    let lexical = Arc::new(LexicalIndex::new());

    Ok(Engine::new(backend, vectors, lexical, config))
}

/// Convenience wrapper over [`open`] for the common case: reads and
/// parses a TOML config document and opens the project-scoped store.
pub async fn open_from_toml(raw: &str) -> MindstoreResult<Engine> {
    let config = MindstoreConfig::from_toml(raw).map_err(MindstoreError::from)?;
    open(config, false).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_with_defaults_wires_an_embedded_store() {
        let dir = std::env::temp_dir().join(format!("mindstore-open-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut config = MindstoreConfig::default();
        config.storage.embedded.path = dir.join("db.sqlite3").to_string_lossy().into_owned();
        let engine = open(config, false).await.unwrap();
        let counters = engine.session_counters();
        assert_eq!(counters.memories_created, 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn postgres_url_prefers_explicit_connection_string() {
        let cfg = config::NetworkedSqlConfig {
            connection_string: Some("postgres://example/db".into()),
            ..Default::default()
        };
        assert_eq!(postgres_url(&cfg).unwrap(), "postgres://example/db");
    }

    #[test]
    fn postgres_url_requires_host_and_database_when_no_dsn_given() {
        let cfg = config::NetworkedSqlConfig::default();
        assert!(postgres_url(&cfg).is_err());
    }
}
