//! Layered memex configuration.
//!
//! Each layer is schema-checked on its own, rewritten to canonical snake_case
//! keys with absolute paths, then folded over the requirements layer, whose
//! keys cannot be overridden. The merged document becomes a `MemexConfig`.

mod layer_io;
mod merge;
mod schema;
mod utils;


use crate::{ConfigError, MemexConfig};
use log::{debug, info};
use memex_rs_protocol::PlatformKind;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "memex.json5";
/// Default config directory under user or repo roots.
const DEFAULT_CONFIG_DIR: &str = ".memex";
/// Marker files/dirs that identify a project root.
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git"];

#[cfg(unix)]
const SYSTEM_CONFIG_PATH: &str = "/etc/memex/memex.json5";
#[cfg(unix)]
const SYSTEM_REQUIREMENTS_PATH: &str = "/etc/memex/requirements.json5";
#[cfg(windows)]
const SYSTEM_CONFIG_PATH: &str = "C:\\ProgramData\\memex\\memex.json5";
#[cfg(windows)]
const SYSTEM_REQUIREMENTS_PATH: &str = "C:\\ProgramData\\memex\\requirements.json5";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub config: MemexConfig,
    /// Every layer that contributed, lowest precedence first.
    pub layers: Vec<ConfigLayer>,
    /// Dotted key paths a layer tried to change but requirements lock.
    pub locked_overrides: Vec<String>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// Immutable requirements constraints.
    Requirements,
    System,
    User,
    /// Project root configuration.
    Project,
    /// Current working directory configuration.
    Cwd,
    /// Repo-local `.memex/` configuration.
    Repo,
    /// Runtime overrides (highest precedence).
    Runtime,
}

impl ConfigLayerSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requirements => "requirements",
            Self::System => "system",
            Self::User => "user",
            Self::Project => "project",
            Self::Cwd => "cwd",
            Self::Repo => "repo",
            Self::Runtime => "runtime",
        }
    }
}

/// Metadata about a loaded config layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: Option<PathBuf>,
}

/// Schema validation mode for layered configs.
#[derive(Debug, Clone, Copy)]
enum SchemaMode {
    /// Partial validation for non-final layers.
    Partial,
    /// Full validation for the effective config.
    Full,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to resolve local layers.
    pub cwd: PathBuf,
    /// Defaults to `/etc/memex/memex.json5` on Unix.
    pub system_config_path: Option<PathBuf>,
    /// Defaults to `~/.memex/memex.json5`.
    pub user_config_path: Option<PathBuf>,
    /// Requirements whose keys lock the effective value.
    pub requirements_path: Option<PathBuf>,
    /// Runtime override config paths applied last.
    pub runtime_paths: Vec<PathBuf>,
    /// Marker files/dirs used to detect the project root.
    pub project_root_markers: Vec<String>,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: layer_io::default_location(ConfigLayerSource::System),
            user_config_path: layer_io::default_location(ConfigLayerSource::User),
            requirements_path: layer_io::default_location(ConfigLayerSource::Requirements),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        }
    }

    /// Add a runtime override config path that is applied last.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl MemexConfig {
    /// Load a single config file (no layering).
    ///
    /// Relative `storage.path` and `audit.path` resolve against the file's directory.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config (path={})", path.display());
        let layer = layer_io::read_required(ConfigLayerSource::Runtime, path)?;
        config_from_value(layer.value, &layer.label)
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let mut value: Value =
            json5::from_str(contents).map_err(|err| ConfigError::parse("config", err))?;
        schema::validate_layer_schema(&value, SchemaMode::Partial, "config")?;
        merge::canonicalize_keys(&mut value, "config")?;
        config_from_value(value, "config")
    }

    /// Load a layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load a layered config stack using explicit layer locations.
    ///
    /// Layer precedence (low -> high): requirements (constraints), system, user,
    /// project, cwd, repo, runtime overrides.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = utils::canonical_cwd(&options.cwd)?;
        let mut stack = Vec::new();

        let requirements = layer_io::read_optional(
            ConfigLayerSource::Requirements,
            options.requirements_path.as_deref(),
        )?;
        let mut layers = Vec::new();
        let mut merge = match requirements {
            Some(layer) => {
                layers.push(layer.meta);
                merge::LayerMerge::new(Some(layer.value))
            }
            None => merge::LayerMerge::new(None),
        };

        for (source, path) in [
            (ConfigLayerSource::System, options.system_config_path.as_deref()),
            (ConfigLayerSource::User, options.user_config_path.as_deref()),
        ] {
            stack.extend(layer_io::read_optional(source, path)?);
        }

        let project_root = utils::find_project_root(&cwd, &options.project_root_markers);
        if let Some(root) = project_root.as_ref() {
            debug!("project root resolved (path={})", root.display());
        }
        let local = [
            project_root
                .as_ref()
                .map(|root| (ConfigLayerSource::Project, root.join(DEFAULT_CONFIG_FILE))),
            Some((ConfigLayerSource::Cwd, cwd.join(DEFAULT_CONFIG_FILE))),
            project_root.as_ref().map(|root| {
                (
                    ConfigLayerSource::Repo,
                    root.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE),
                )
            }),
        ];
        let mut seen = HashSet::new();
        for (source, path) in local.into_iter().flatten() {
            let identity = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if !seen.insert(identity) {
                debug!(
                    "config layer already loaded (source={}, path={})",
                    source.as_str(),
                    path.display()
                );
                continue;
            }
            stack.extend(layer_io::read_optional(source, Some(&path))?);
        }

        for path in &options.runtime_paths {
            stack.push(layer_io::read_required(ConfigLayerSource::Runtime, path)?);
        }

        for layer in stack {
            merge.apply(&layer.value, &layer.label);
            layers.push(layer.meta);
        }
        let (merged, locked_overrides) = merge.finish();
        let config = config_from_value(merged, "effective")?;
        info!(
            "layered config loaded (layers={}, locked_overrides={})",
            layers.len(),
            locked_overrides.len()
        );
        Ok(LayeredConfig {
            config,
            layers,
            locked_overrides,
        })
    }

    /// Validate ranges and cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        check_range("engine.gamma", engine.gamma, 0.0, 2.0)?;
        check_range("engine.barrier", engine.barrier, 0.0, 1.0)?;
        check_range("engine.recall_threshold", engine.recall_threshold, 0.0, 1.0)?;
        check_range("engine.write_threshold", engine.write_threshold, 0.0, 1.0)?;
        check_range("engine.platform_weight", engine.platform_weight, 0.0, 1.0)?;
        if PlatformKind::from_name(&engine.platform).is_none() {
            return Err(ConfigError::InvalidField {
                path: "engine.platform".to_string(),
                message: format!("unknown platform {:?}", engine.platform),
            });
        }
        if engine.namespace.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                path: "engine.namespace".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        for (name, weight) in self.recall.weights.values() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidField {
                    path: format!("recall.weights.{name}"),
                    message: "must be a non-negative number".to_string(),
                });
            }
        }
        let half_life = self.recall.half_life_days;
        if half_life.is_nan() || half_life <= 0.0 {
            return Err(ConfigError::InvalidField {
                path: "recall.half_life_days".to_string(),
                message: "must be positive".to_string(),
            });
        }

        let storage = &self.storage;
        let ordered = storage.warm_after_days > 0.0 && storage.warm_after_days < storage.cold_after_days;
        if !ordered {
            return Err(ConfigError::Invalid(format!(
                "storage tiers require 0 < warm_after_days < cold_after_days (got {} and {})",
                storage.warm_after_days, storage.cold_after_days
            )));
        }
        Ok(())
    }
}

fn check_range(path: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidField {
            path: path.to_string(),
            message: format!("expected a value in [{min}, {max}], got {value}"),
        })
    }
}

/// A parsed layer with canonical keys and absolute paths.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    /// `source(path)`, used in error messages and logs.
    label: String,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<MemexConfig, ConfigError> {
    schema::validate_layer_schema(&value, SchemaMode::Full, label)?;
    let config: MemexConfig = serde_json::from_value(value)?;
    debug!("config decoded (label={label})");
    config.validate()?;
    Ok(config)
}
