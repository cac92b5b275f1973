//! Memory model, scoring, extraction, recall, and storage for memex.

pub mod audit;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod injector;
pub mod model;
pub mod policy;
pub mod recall;
pub mod retriever;
pub mod sanitizer;
pub mod scorer;
pub mod store;
pub mod text;

/// Audit trail.
pub use audit::{AuditAction, AuditEntry, AuditSink, FileAuditLog, InMemoryAuditLog, NullAuditLog};
/// Embedding collaborator.
pub use embedding::{Embedder, cosine_similarity};
/// Memory error type.
pub use error::MemoryError;
/// Candidate extraction.
pub use extractor::{Candidate, EntryOptions, ExtractionRule, Extractor, create_memory_entry};
/// Context rendering.
pub use injector::{ContextBlock, render_context};
/// Memory record model.
pub use model::{
    CompressionLevel, Dimensions, MemoryFilter, MemoryId, MemoryRecord, MemoryStatus, MemoryType,
    Origin, Scope, Sensitivity, StorageTier,
};
/// Write and tier policies.
pub use policy::{TierPolicy, WriteDecision, WritePolicy};
/// Recall modes and options.
pub use recall::{Budget, RecallMode, RecallOptions};
/// Ranking and budgeting.
pub use retriever::{Retriever, ScoredMemory, SemanticRetriever};
/// Sensitive content masking.
pub use sanitizer::{MaskOutcome, Sanitizer};
/// Scoring functions.
pub use scorer::{RecallWeights, ScoringParams, activation};
/// Storage backends.
pub use store::{CompactionReport, FileStore, InMemoryStore, MemoryStore, TieredStore};
