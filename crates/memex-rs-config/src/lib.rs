//! Configuration models and layered config loading.
//!
//! This crate owns the memex config schema, validation, and layer-merging
//! logic used to build an engine from JSON5 files.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config types and loader options.
pub use loader::{ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions};
/// Configuration schema models.
pub use model::{
    AuditConfig, BudgetConfig, EngineConfig, MemexConfig, MemexConfigBuilder, RecallConfig,
    RecallWeightsConfig, StorageBackend, StorageConfig,
};
