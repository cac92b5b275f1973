//! Memory decision engine for memex.
//!
//! This crate owns the per-turn orchestration (recall, inject, extract, write),
//! the fail-open error policy, and the per-scope write serialization that sit
//! on top of `memex-rs-memory`.

mod config_map;
mod engine;
pub mod error;
mod locks;
pub mod types;

pub use engine::Engine;
pub use error::EngineError;
/// Turn, write, and maintenance results.
pub use types::{
    CleanupReport, EngineStats, RecallOutcome, TurnError, TurnPhase, TurnResult, WriteOutcome,
};
