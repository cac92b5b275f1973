//! Write gating and tier migration policies.

use crate::model::{MemoryRecord, MemoryType, StorageTier};
use crate::scorer::{DEFAULT_BARRIER, DEFAULT_GAMMA, activation, meets_type_threshold, write_score};
use chrono::{DateTime, Utc};

/// Default write threshold compared against the raw write score.
pub const DEFAULT_WRITE_THRESHOLD: f64 = 0.5;

/// Policy deciding whether a candidate is persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WritePolicy {
    pub gamma: f64,
    pub barrier: f64,
    pub write_threshold: f64,
    pub platform_weight: f64,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            gamma: DEFAULT_GAMMA,
            barrier: DEFAULT_BARRIER,
            write_threshold: DEFAULT_WRITE_THRESHOLD,
            platform_weight: 1.0,
        }
    }
}

/// Outcome of evaluating the write gate for one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteDecision {
    pub write_score: f64,
    pub probability: f64,
    pub threshold: f64,
    pub accepted: bool,
}

impl WritePolicy {
    /// Evaluate the write score and the per-type activation gate.
    pub fn evaluate(&self, record: &MemoryRecord) -> WriteDecision {
        let memory_type = record.memory_type();
        let score = write_score(&record.meta.dimensions, self.platform_weight);
        let probability = activation(score, self.gamma, self.barrier);
        WriteDecision {
            write_score: score,
            probability,
            threshold: memory_type.activation_threshold(),
            accepted: score >= self.write_threshold
                && meets_type_threshold(memory_type, probability),
        }
    }
}

/// Age thresholds separating the hot, warm, and cold tiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierPolicy {
    pub warm_after_days: f64,
    pub cold_after_days: f64,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            warm_after_days: 7.0,
            cold_after_days: 30.0,
        }
    }
}

impl TierPolicy {
    /// Tier for a record given its age since last use.
    pub fn tier_for(&self, record: &MemoryRecord, now: DateTime<Utc>) -> StorageTier {
        self.tier_for_age(record.days_since_last_use(now))
    }

    pub fn tier_for_age(&self, days: f64) -> StorageTier {
        if days < self.warm_after_days {
            StorageTier::Hot
        } else if days < self.cold_after_days {
            StorageTier::Warm
        } else {
            StorageTier::Cold
        }
    }
}

/// True when `memory_type` can pass the gate at all under `policy`.
pub fn reachable(memory_type: MemoryType, policy: &WritePolicy) -> bool {
    meets_type_threshold(memory_type, activation(1.0, policy.gamma, policy.barrier))
}
