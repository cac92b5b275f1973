//! Error types for the memex engine.

use memex_rs_config::ConfigError;
use memex_rs_memory::MemoryError;
use memex_rs_protocol::AdapterError;
use thiserror::Error;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No platform adapter is attached to the engine.
    #[error("platform adapter not configured for {0:?}")]
    NotConfigured(String),
    /// Store, sanitizer, or version chain failure.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
    /// Request or response did not match the platform shape.
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
    /// Caller supplied an unusable argument.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Engine configuration failed to load or validate.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Audit trail could not be read or written.
    #[error("audit error: {0}")]
    Audit(String),
}
