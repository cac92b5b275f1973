//! Activation model and the recall/write scores built on it.
//!
//! Everything here is pure: the same inputs always produce the same score.

use crate::model::{Dimensions, MemoryRecord, MemoryType};
use crate::text::text_similarity;
use chrono::{DateTime, Utc};

/// Default sigmoid steepness.
pub const DEFAULT_GAMMA: f64 = 0.85;
/// Default sigmoid midpoint.
pub const DEFAULT_BARRIER: f64 = 0.5;
/// Upper bound for `gamma`.
pub const MAX_GAMMA: f64 = 2.0;
/// Default recency half-life in days.
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 30.0;

/// Sigmoid activation: `1 / (1 + exp(-2·gamma·(input - barrier)))`.
///
/// `input` is clamped to `[0, 1]` and `gamma` to `[0, 2]`; the result is
/// rounded to four decimals. `gamma == 0` yields 0.5 for every input.
pub fn activation(input: f64, gamma: f64, barrier: f64) -> f64 {
    let input = clamp_unit(input);
    let gamma = if gamma.is_nan() {
        0.0
    } else {
        gamma.clamp(0.0, MAX_GAMMA)
    };
    if gamma == 0.0 {
        return 0.5;
    }
    let barrier = clamp_unit(barrier);
    let p = 1.0 / (1.0 + (-2.0 * gamma * (input - barrier)).exp());
    round4(p)
}

/// Round to four decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Exponential decay `0.5^(days / half_life)`.
pub fn time_decay(days: f64, half_life_days: f64) -> f64 {
    if half_life_days <= 0.0 {
        return if days <= 0.0 { 1.0 } else { 0.0 };
    }
    0.5_f64.powf(days.max(0.0) / half_life_days)
}

/// Weights for the recall score factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecallWeights {
    pub keyword: f64,
    pub priority: f64,
    pub recency: f64,
    pub platform: f64,
    pub type_priority: f64,
}

impl RecallWeights {
    /// Four-factor weighting without the type-priority term.
    pub fn basic() -> Self {
        Self {
            type_priority: 0.0,
            ..Self::default()
        }
    }
}

impl Default for RecallWeights {
    /// Retrieval weighting: 35/25/20/10/10.
    fn default() -> Self {
        Self {
            keyword: 0.35,
            priority: 0.25,
            recency: 0.20,
            platform: 0.10,
            type_priority: 0.10,
        }
    }
}

/// Parameters shared by every recall score computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    pub gamma: f64,
    pub barrier: f64,
    pub half_life_days: f64,
    pub platform_weight: f64,
    pub weights: RecallWeights,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            gamma: DEFAULT_GAMMA,
            barrier: DEFAULT_BARRIER,
            half_life_days: DEFAULT_HALF_LIFE_DAYS,
            platform_weight: 1.0,
            weights: RecallWeights::default(),
        }
    }
}

/// Normalized recall factors for one record, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecallFactors {
    pub similarity: f64,
    pub priority: f64,
    pub recency: f64,
    pub platform: f64,
    pub type_priority: f64,
}

impl RecallFactors {
    /// Compute factors given a precomputed query similarity.
    pub fn for_record(
        similarity: f64,
        record: &MemoryRecord,
        params: &ScoringParams,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            similarity: clamp_unit(similarity),
            priority: record.meta.dimensions.recall_priority,
            recency: time_decay(record.days_since_last_use(now), params.half_life_days),
            platform: clamp_unit(params.platform_weight),
            type_priority: record.memory_type().normalized_priority(),
        }
    }

    /// Weighted sum of the factors.
    pub fn weighted(&self, weights: &RecallWeights) -> f64 {
        weights.keyword * self.similarity
            + weights.priority * self.priority
            + weights.recency * self.recency
            + weights.platform * self.platform
            + weights.type_priority * self.type_priority
    }
}

/// Keyword overlap between a query and a record's text.
pub fn keyword_similarity(query: &str, record: &MemoryRecord) -> f64 {
    text_similarity(query, record.full_text())
}

/// Raw (pre-activation) recall score.
pub fn raw_recall_score(
    query: &str,
    record: &MemoryRecord,
    params: &ScoringParams,
    now: DateTime<Utc>,
) -> f64 {
    RecallFactors::for_record(keyword_similarity(query, record), record, params, now)
        .weighted(&params.weights)
}

/// Recall probability: the raw score passed through `activation`.
pub fn recall_score(
    query: &str,
    record: &MemoryRecord,
    params: &ScoringParams,
    now: DateTime<Utc>,
) -> f64 {
    activation(
        raw_recall_score(query, record, params, now),
        params.gamma,
        params.barrier,
    )
}

/// Write score: `0.4·confidence + 0.3·importance + 0.2·platform + 0.1·freshness`.
///
/// Freshness is the `time_decay` dimension. No activation is applied.
pub fn write_score(dimensions: &Dimensions, platform_weight: f64) -> f64 {
    0.4 * dimensions.confidence
        + 0.3 * dimensions.importance
        + 0.2 * clamp_unit(platform_weight)
        + 0.1 * dimensions.time_decay
}

/// True when `probability` meets the fixed activation threshold of `memory_type`.
pub fn meets_type_threshold(memory_type: MemoryType, probability: f64) -> bool {
    probability >= memory_type.activation_threshold()
}

#[cfg(test)]
mod tests {
    use super::{
        RecallWeights, ScoringParams, activation, keyword_similarity, meets_type_threshold,
        raw_recall_score, recall_score, time_decay, write_score,
    };
    use crate::model::{CompressionLevel, Dimensions, MemoryRecord, MemoryType, Scope};
    use crate::store::compress;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn activation_is_half_at_barrier() {
        for gamma in [0.1, 0.85, 1.5, 2.0] {
            for barrier in [0.2, 0.5, 0.9] {
                assert_eq!(activation(barrier, gamma, barrier), 0.5);
            }
        }
    }

    #[test]
    fn activation_is_bounded_and_increasing() {
        let mut previous = -1.0;
        for step in 0..=20 {
            let input = f64::from(step) / 20.0;
            let p = activation(input, 2.0, 0.5);
            assert!((0.0..=1.0).contains(&p));
            assert!(p > previous, "not increasing at {input}");
            previous = p;
        }
    }

    #[test]
    fn activation_clamps_input_and_gamma() {
        assert_eq!(activation(-5.0, 0.85, 0.5), activation(0.0, 0.85, 0.5));
        assert_eq!(activation(5.0, 0.85, 0.5), activation(1.0, 0.85, 0.5));
        assert_eq!(activation(0.9, 9.0, 0.5), activation(0.9, 2.0, 0.5));
        assert_eq!(activation(0.9, 0.0, 0.5), 0.5);
        assert_eq!(activation(0.1, -1.0, 0.5), 0.5);
    }

    #[test]
    fn activation_rounds_to_four_decimals() {
        assert_eq!(activation(1.0, 0.85, 0.5), 0.7006);
        assert_eq!(activation(0.0, 0.85, 0.5), 0.2994);
    }

    #[test]
    fn time_decay_halves_per_half_life() {
        assert_eq!(time_decay(0.0, 30.0), 1.0);
        assert_eq!(time_decay(30.0, 30.0), 0.5);
        assert_eq!(time_decay(60.0, 30.0), 0.25);
        assert_eq!(time_decay(1.0, 0.0), 0.0);
    }

    #[test]
    fn write_score_uses_documented_weights() {
        let dims = Dimensions::new(0.85, 0.8, 1.0, 0.8);
        let score = write_score(&dims, 1.0);
        assert!((score - 0.88).abs() < 1e-9);
        assert!(!meets_type_threshold(MemoryType::Persona, activation(score, 0.85, 0.5)));
        assert!(meets_type_threshold(MemoryType::Persona, activation(score, 2.0, 0.5)));
    }

    #[test]
    fn recall_score_prefers_overlapping_text() {
        let scope = Scope::new("generic", "default");
        let now = Utc::now();
        let mut related = MemoryRecord::new(&scope, MemoryType::Core, "rust async runtime", now);
        related.meta.dimensions = Dimensions::new(0.8, 0.7, 1.0, 0.5);
        let mut unrelated = MemoryRecord::new(&scope, MemoryType::Core, "banana bread", now);
        unrelated.meta.dimensions = Dimensions::new(0.8, 0.7, 1.0, 0.5);
        let params = ScoringParams::default();
        assert!(
            recall_score("async rust", &related, &params, now)
                > recall_score("async rust", &unrelated, &params, now)
        );
    }

    #[test]
    fn raw_recall_score_decays_with_age() {
        let scope = Scope::new("generic", "default");
        let now = Utc::now();
        let mut record = MemoryRecord::new(&scope, MemoryType::Episodic, "standup notes", now);
        record.meta.dimensions = Dimensions::new(0.6, 0.4, 1.0, 0.4);
        let params = ScoringParams {
            weights: RecallWeights::basic(),
            ..ScoringParams::default()
        };
        let fresh = raw_recall_score("standup notes", &record, &params, now);
        record.meta.lifecycle.last_used_at = now - Duration::days(30);
        let stale = raw_recall_score("standup notes", &record, &params, now);
        assert!((fresh - stale - 0.1).abs() < 1e-9);
    }

    #[test]
    fn compressed_records_score_on_their_original_text() {
        let scope = Scope::new("generic", "default");
        let now = Utc::now();
        let record = MemoryRecord::new(
            &scope,
            MemoryType::Episodic,
            "Migrated billing service. Postgres replica lag fixed by tuning wal settings",
            now,
        );
        let cold = compress(&record, CompressionLevel::Summary);
        assert!(cold.body.text.contains("[keywords:"));
        let query = "postgres replica lag";
        assert_eq!(
            keyword_similarity(query, &cold),
            keyword_similarity(query, &record)
        );
        let params = ScoringParams::default();
        assert_eq!(
            raw_recall_score(query, &cold, &params, now),
            raw_recall_score(query, &record, &params, now)
        );
    }
}
