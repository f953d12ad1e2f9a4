//! Resolved at startup; unknown keys are warned about, not fatal
//! (spec.md §6). Each section is its own struct with `#[serde(default)]`,
//! matching `cortex-core::config::decay_config`'s per-subsystem style.

mod defaults;
mod storage_config;

use serde::{Deserialize, Serialize};

pub use storage_config::{
    BackendKind, EmbeddedConfig, ExternalVectorConfig, NetworkedSqlConfig, StorageConfig,
    VectorKind,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub bm25_alpha: f64,
    pub temporal_auto_skip: bool,
    pub quality_boost_enabled: bool,
    pub quality_boost_weight: f64,
    pub mmr_enabled: bool,
    pub mmr_lambda: f64,
    pub query_expansion_enabled: bool,
    pub query_expansion_mode: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: defaults::DEFAULT_TOP_K,
            bm25_alpha: defaults::DEFAULT_BM25_ALPHA,
            temporal_auto_skip: true,
            quality_boost_enabled: true,
            quality_boost_weight: defaults::DEFAULT_QUALITY_BOOST_WEIGHT,
            mmr_enabled: true,
            mmr_lambda: defaults::DEFAULT_MMR_LAMBDA,
            query_expansion_enabled: false,
            query_expansion_mode: "off".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub enabled: bool,
    pub decay_rate: f64,
    pub access_weight: f64,
    pub max_access_boost: f64,
    pub keep_threshold: f64,
    pub delete_threshold: f64,
    pub default_quality_score: f64,
    pub use_temporal_decay: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            decay_rate: defaults::DEFAULT_DECAY_RATE,
            access_weight: defaults::DEFAULT_ACCESS_WEIGHT,
            max_access_boost: defaults::DEFAULT_MAX_ACCESS_BOOST,
            keep_threshold: 0.3,
            delete_threshold: 0.1,
            default_quality_score: 0.5,
            use_temporal_decay: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphCentralityConfig {
    pub enabled: bool,
    pub weight: f64,
}

impl Default for GraphCentralityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GraphConfig {
    pub centrality: GraphCentralityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityScoringConfig {
    pub enabled: bool,
    pub threshold: f64,
}

impl Default for QualityScoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SensitiveFilterConfig {
    pub enabled: bool,
    pub auto_redact: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MindstoreConfig {
    pub storage: StorageConfig,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval: RetrievalConfig,
    pub retention: RetentionConfig,
    pub graph: GraphConfig,
    pub dead_end_boost: f64,
    pub quality_scoring: QualityScoringConfig,
    pub sensitive_filter: SensitiveFilterConfig,
}

impl Default for MindstoreConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            chunk_size: crate::constants::DEFAULT_CHUNK_SIZE,
            chunk_overlap: crate::constants::DEFAULT_CHUNK_OVERLAP,
            retrieval: RetrievalConfig::default(),
            retention: RetentionConfig::default(),
            graph: GraphConfig::default(),
            dead_end_boost: crate::constants::DEFAULT_DEAD_END_BOOST,
            quality_scoring: QualityScoringConfig::default(),
            sensitive_filter: SensitiveFilterConfig::default(),
        }
    }
}

impl MindstoreConfig {
    /// Parse from a TOML document, warning (not failing) on unrecognized
    /// top-level keys.
    pub fn from_toml(raw: &str) -> Result<Self, crate::errors::ConfigError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| crate::errors::ConfigError::ParseFailed {
                reason: e.to_string(),
            })?;

        if let Ok(toml::Value::Table(table)) = raw.parse::<toml::Value>() {
            let known = [
                "storage",
                "chunk_size",
                "chunk_overlap",
                "retrieval",
                "retention",
                "graph",
                "dead_end_boost",
                "quality_scoring",
                "sensitive_filter",
            ];
            for key in table.keys() {
                if !known.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "unrecognized config key, ignoring");
                }
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied_for_empty_doc() {
        let cfg = MindstoreConfig::from_toml("").unwrap();
        assert_eq!(cfg.chunk_size, 500);
        assert_eq!(cfg.retrieval.default_top_k, defaults::DEFAULT_TOP_K);
    }

    #[test]
    fn unknown_top_level_key_is_not_fatal() {
        let cfg = MindstoreConfig::from_toml("made_up_key = 1\nchunk_size = 750").unwrap();
        assert_eq!(cfg.chunk_size, 750);
    }
}
