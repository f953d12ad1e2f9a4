use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    Embedded,
    NetworkedSql,
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::Embedded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorKind {
    Builtin,
    External,
}

impl Default for VectorKind {
    fn default() -> Self {
        Self::Builtin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedConfig {
    pub path: String,
    pub global_path: String,
    pub wal_mode: bool,
    pub busy_timeout_ms: u64,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            path: ".mindstore/db.sqlite3".to_string(),
            global_path: "~/.mindstore/global.sqlite3".to_string(),
            wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NetworkedSqlConfig {
    pub connection_string: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub ssl: bool,
    pub pool_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalVectorConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection_prefix: String,
    pub search_ef: u64,
    pub use_quantization: bool,
}

impl Default for ExternalVectorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection_prefix: "mindstore".to_string(),
            search_ef: crate::constants::HNSW_SEARCH_EF,
            use_quantization: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub vector: VectorKind,
    pub embedded: EmbeddedConfig,
    pub networked_sql: NetworkedSqlConfig,
    pub external_vector: ExternalVectorConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            vector: VectorKind::default(),
            embedded: EmbeddedConfig::default(),
            networked_sql: NetworkedSqlConfig::default(),
            external_vector: ExternalVectorConfig::default(),
        }
    }
}
