//! Row <-> domain-type conversions shared across the query modules.

use chrono::{DateTime, Utc};

use mindstore_core::errors::{MindstoreResult, StorageError};

pub fn embedding_to_blob(embedding: &Option<Vec<f32>>) -> Option<Vec<u8>> {
    embedding.as_ref().map(|v| {
        let mut bytes = Vec::with_capacity(v.len() * 4);
        for f in v {
            bytes.extend_from_slice(&f.to_le_bytes());
        }
        bytes
    })
}

pub fn blob_to_embedding(blob: Option<Vec<u8>>) -> Option<Vec<f32>> {
    blob.map(|bytes| {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    })
}

pub fn parse_dt(s: &str) -> MindstoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StorageError::Sqlite {
                message: format!("parse datetime '{s}': {e}"),
            }
            .into()
        })
}

pub fn parse_dt_opt(s: Option<String>) -> MindstoreResult<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_dt).transpose()
}

pub fn fmt_dt(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub fn fmt_dt_opt(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(fmt_dt)
}

pub fn tags_to_json(tags: &[String]) -> MindstoreResult<String> {
    serde_json::to_string(tags).map_err(|e| {
        StorageError::Serialization {
            reason: e.to_string(),
        }
        .into()
    })
}

pub fn tags_from_json(s: &str) -> MindstoreResult<Vec<String>> {
    serde_json::from_str(s).map_err(|e| {
        StorageError::Serialization {
            reason: e.to_string(),
        }
        .into()
    })
}

pub fn factors_to_json(factors: &mindstore_core::model::QualityFactors) -> MindstoreResult<String> {
    serde_json::to_string(factors).map_err(|e| {
        StorageError::Serialization {
            reason: e.to_string(),
        }
        .into()
    })
}

pub fn factors_from_json(s: &str) -> MindstoreResult<mindstore_core::model::QualityFactors> {
    serde_json::from_str(s).map_err(|e| {
        StorageError::Serialization {
            reason: e.to_string(),
        }
        .into()
    })
}
