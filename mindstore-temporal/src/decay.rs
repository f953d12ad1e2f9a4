//! Decay-weighted quality scoring (spec.md §4.6, §6 `retention.*`
//! config), grounded on a prior implementation's multiplicative
//! confidence formula: a temporal-recency factor times a usage-frequency
//! boost, applied to the memory's stored quality score and clamped to
//! `[0.0, 1.0]`.

use chrono::{DateTime, Utc};

use mindstore_core::model::Memory;

/// Retention-scoring parameters sourced from `retention.*` config.
#[derive(Debug, Clone, Copy)]
pub struct DecayParams {
    pub decay_rate: f64,
    pub access_weight: f64,
    pub max_access_boost: f64,
    pub use_temporal_decay: bool,
}

impl Default for DecayParams {
    fn default() -> Self {
        Self {
            decay_rate: 0.01,
            access_weight: 0.2,
            max_access_boost: 1.5,
            use_temporal_decay: true,
        }
    }
}

/// `quality_score × temporal_decay × usage_boost`, clamped to `[0, 1]`.
/// `temporal_decay` is `e^(-days_since_access × decay_rate)`; `usage_boost`
/// is `min(max_access_boost, 1 + ln(access_count + 1) × access_weight)`.
pub fn weighted_quality(memory: &Memory, params: &DecayParams, now: DateTime<Utc>) -> f64 {
    let temporal = if params.use_temporal_decay {
        temporal_factor(memory.last_accessed, now, params.decay_rate)
    } else {
        1.0
    };
    let usage = usage_boost(memory.access_count, params.access_weight, params.max_access_boost);

    (memory.quality_score * temporal * usage).clamp(0.0, 1.0)
}

fn temporal_factor(last_accessed: DateTime<Utc>, now: DateTime<Utc>, decay_rate: f64) -> f64 {
    let days_since_access = (now - last_accessed).num_seconds().max(0) as f64 / 86400.0;
    (-days_since_access * decay_rate).exp()
}

fn usage_boost(access_count: u64, access_weight: f64, max_access_boost: f64) -> f64 {
    let boost = 1.0 + ((access_count as f64 + 1.0).ln() * access_weight);
    boost.min(max_access_boost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindstore_core::model::{MemoryType, QualityFactors};

    fn sample(quality: f64, access_count: u64, last_accessed: DateTime<Utc>) -> Memory {
        Memory {
            id: 1,
            content: "x".into(),
            tags: vec![],
            source: "test".into(),
            memory_type: MemoryType::Observation,
            quality_score: quality,
            quality_factors: QualityFactors::default(),
            embedding: None,
            access_count,
            last_accessed,
            valid_from: None,
            valid_until: None,
            created_at: last_accessed,
            invalidated_by: None,
        }
    }

    #[test]
    fn fresh_high_quality_memory_stays_near_its_score() {
        let now = Utc::now();
        let memory = sample(0.9, 0, now);
        let score = weighted_quality(&memory, &DecayParams::default(), now);
        assert!((score - 0.9).abs() < 0.01);
    }

    #[test]
    fn stale_memory_decays_below_its_stored_score() {
        let now = Utc::now();
        let memory = sample(0.9, 0, now - chrono::Duration::days(365));
        let score = weighted_quality(&memory, &DecayParams::default(), now);
        assert!(score < 0.9);
    }

    #[test]
    fn frequently_accessed_memory_decays_slower() {
        let now = Utc::now();
        let stale = now - chrono::Duration::days(90);
        let rarely = weighted_quality(&sample(0.8, 0, stale), &DecayParams::default(), now);
        let often = weighted_quality(&sample(0.8, 500, stale), &DecayParams::default(), now);
        assert!(often > rarely);
    }

    #[test]
    fn disabling_temporal_decay_ignores_staleness() {
        let now = Utc::now();
        let params = DecayParams {
            use_temporal_decay: false,
            ..DecayParams::default()
        };
        let stale = sample(0.8, 0, now - chrono::Duration::days(1000));
        assert!((weighted_quality(&stale, &params, now) - 0.8).abs() < 0.01);
    }
}
