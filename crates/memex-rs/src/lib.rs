//! Public SDK surface for memex.
//!
//! Re-exports the engine, memory model, platform adapters, and config
//! loader, plus helpers that build an [`Engine`] from layered config files.

/// Re-export for convenience.
pub use memex_rs_config as config;
pub use memex_rs_core as core;
/// Re-export for convenience.
pub use memex_rs_memory as memory;
/// Re-export for convenience.
pub use memex_rs_protocol as protocol;

pub use memex_rs_config::{LayeredConfigOptions, MemexConfig};
pub use memex_rs_core::{Engine, EngineError, TurnResult};
pub use memex_rs_protocol::TurnContext;

use log::info;
use std::path::Path;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// No-op without the feature. Hosts call this once before building an engine.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}

/// Build an engine from the layered config stack rooted at `cwd`.
pub fn open(cwd: impl AsRef<Path>) -> Result<Engine, EngineError> {
    open_with_options(LayeredConfigOptions::new(cwd))
}

/// Build an engine from explicit layer locations.
pub fn open_with_options(options: LayeredConfigOptions) -> Result<Engine, EngineError> {
    let layered = MemexConfig::load_layered_with_options(options)?;
    info!(
        "memex config loaded (layers={}, platform={}, namespace={})",
        layered.layers.len(),
        layered.config.engine.platform,
        layered.config.engine.namespace
    );
    Engine::from_config(layered.config)
}
