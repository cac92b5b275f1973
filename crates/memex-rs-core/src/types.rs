//! Result types produced by engine operations.

use memex_rs_memory::{
    CompactionReport, ContextBlock, MemoryId, MemoryRecord, MemoryStatus, MemoryType,
    ScoredMemory, WriteDecision,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Phases of a conversational turn, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Recall,
    Inject,
    Extract,
    Write,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Recall => "recall",
            Self::Inject => "inject",
            Self::Extract => "extract",
            Self::Write => "write",
        };
        f.write_str(name)
    }
}

/// A phase failure captured without aborting the turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnError {
    pub phase: TurnPhase,
    pub message: String,
}

impl TurnError {
    pub fn new(phase: TurnPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }
}

/// Result of a single write attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Persisted, possibly replacing a near-duplicate.
    Written {
        record: MemoryRecord,
        superseded: Option<MemoryId>,
    },
    /// Rejected by the write gate.
    Filtered {
        text: String,
        memory_type: MemoryType,
        decision: WriteDecision,
    },
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }

    /// Stored record, when the write went through.
    pub fn record(&self) -> Option<&MemoryRecord> {
        match self {
            Self::Written { record, .. } => Some(record),
            Self::Filtered { .. } => None,
        }
    }

    pub fn superseded(&self) -> Option<&str> {
        match self {
            Self::Written { superseded, .. } => superseded.as_deref(),
            Self::Filtered { .. } => None,
        }
    }
}

/// Outcome of the recall and inject phases.
///
/// `request` is the injected request on success and the caller's original
/// request whenever anything failed.
#[derive(Debug, Clone)]
pub struct RecallOutcome {
    pub request: Value,
    pub recalled: Vec<ScoredMemory>,
    pub context: Option<ContextBlock>,
    pub error: Option<TurnError>,
}

impl RecallOutcome {
    pub fn injected(&self) -> bool {
        self.context.is_some() && self.error.is_none()
    }
}

/// Accumulated result of `Engine::process_turn`.
#[derive(Debug, Clone)]
pub struct TurnResult {
    /// Outbound request to forward to the model.
    pub request: Value,
    /// Records selected for injection.
    pub recalled: Vec<ScoredMemory>,
    pub injected: bool,
    /// Number of candidates the extractor produced.
    pub extracted: usize,
    pub written: Vec<MemoryRecord>,
    pub filtered: usize,
    pub errors: Vec<TurnError>,
}

impl TurnResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Expiry sweep and compaction counts from `Engine::cleanup`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub expired: usize,
    pub compaction: CompactionReport,
}

/// Record counts for the engine scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub total: usize,
    pub by_status: BTreeMap<MemoryStatus, usize>,
    pub by_type: BTreeMap<MemoryType, usize>,
}

impl EngineStats {
    pub fn status(&self, status: MemoryStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn of_type(&self, memory_type: MemoryType) -> usize {
        self.by_type.get(&memory_type).copied().unwrap_or(0)
    }
}
