//! Memory recall configuration.

use crate::model::MemoryType;
use crate::scorer::ScoringParams;

/// Default recall threshold applied to activation scores.
pub const DEFAULT_RECALL_THRESHOLD: f64 = 0.5;
/// Scores within this distance of a group's best score are tied.
pub const TIE_WINDOW: f64 = 0.1;

/// Recall modes supported by the retriever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecallMode {
    /// Jaccard keyword overlap.
    #[default]
    Keyword,
    /// Embedding cosine similarity, falling back to keyword overlap.
    Semantic,
}

/// Per-type cap on recalled records. `None` means uncapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub pinned: Option<usize>,
    pub persona: Option<usize>,
    pub core: Option<usize>,
    pub episodic: Option<usize>,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            pinned: None,
            persona: Some(3),
            core: Some(4),
            episodic: Some(6),
        }
    }
}

impl Budget {
    /// No caps on any type.
    pub fn unlimited() -> Self {
        Self {
            pinned: None,
            persona: None,
            core: None,
            episodic: None,
        }
    }

    /// Cap for `memory_type`.
    pub fn limit(&self, memory_type: MemoryType) -> Option<usize> {
        match memory_type {
            MemoryType::Pinned => self.pinned,
            MemoryType::Persona => self.persona,
            MemoryType::Core => self.core,
            MemoryType::Episodic => self.episodic,
        }
    }
}

/// Recall options for memory retrieval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecallOptions {
    pub params: ScoringParams,
    /// Minimum activation score for a record to be recalled.
    pub recall_threshold: f64,
    pub budget: Budget,
    pub mode: RecallMode,
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self {
            params: ScoringParams::default(),
            recall_threshold: DEFAULT_RECALL_THRESHOLD,
            budget: Budget::default(),
            mode: RecallMode::Keyword,
        }
    }
}
