//! Error types for memory operations.

use crate::model::MemoryId;

/// Errors returned by stores, sanitizers, and helpers.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(String),
    /// No record with the given id.
    #[error("memory not found: {0}")]
    NotFound(MemoryId),
    /// A record with the given id already exists.
    #[error("duplicate memory id: {0}")]
    DuplicateId(MemoryId),
    /// Record failed structural validation.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    /// Superseding would close a loop in the version chain.
    #[error("supersede cycle: {id} cannot supersede {supersedes}")]
    VersionCycle { id: MemoryId, supersedes: MemoryId },
    /// Embedding collaborator failed.
    #[error("embedding error: {0}")]
    Embedding(String),
}
