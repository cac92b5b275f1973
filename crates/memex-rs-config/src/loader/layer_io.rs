//! Reading config layers from disk.

use super::{
    ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LoadedLayer,
    SYSTEM_CONFIG_PATH, SYSTEM_REQUIREMENTS_PATH, SchemaMode, merge, schema, utils,
};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Built-in location for the machine-wide and per-user layers.
///
/// Local layers (project, cwd, repo) depend on the cwd and runtime layers
/// are always explicit, so they have no default.
pub(super) fn default_location(source: ConfigLayerSource) -> Option<PathBuf> {
    match source {
        ConfigLayerSource::Requirements => Some(PathBuf::from(SYSTEM_REQUIREMENTS_PATH)),
        ConfigLayerSource::System => Some(PathBuf::from(SYSTEM_CONFIG_PATH)),
        ConfigLayerSource::User => UserDirs::new().map(|dirs| {
            dirs.home_dir()
                .join(DEFAULT_CONFIG_DIR)
                .join(DEFAULT_CONFIG_FILE)
        }),
        ConfigLayerSource::Project
        | ConfigLayerSource::Cwd
        | ConfigLayerSource::Repo
        | ConfigLayerSource::Runtime => None,
    }
}

/// Read a layer that may be absent; a missing file is skipped.
pub(super) fn read_optional(
    source: ConfigLayerSource,
    path: Option<&Path>,
) -> Result<Option<LoadedLayer>, ConfigError> {
    let Some(path) = path else {
        return Ok(None);
    };
    match fs::read_to_string(path) {
        Ok(contents) => decode_layer(source, path, &contents).map(Some),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(
                "config layer absent (source={}, path={})",
                source.as_str(),
                path.display()
            );
            Ok(None)
        }
        Err(err) => Err(ConfigError::read(path, err)),
    }
}

/// Read a layer that must exist.
pub(super) fn read_required(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<LoadedLayer, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|err| ConfigError::read(path, err))?;
    decode_layer(source, path, &contents)
}

/// Parse, schema-check, canonicalize keys, and anchor relative paths.
fn decode_layer(
    source: ConfigLayerSource,
    path: &Path,
    contents: &str,
) -> Result<LoadedLayer, ConfigError> {
    let label = format!("{}({})", source.as_str(), path.display());
    let mut value: Value =
        json5::from_str(contents).map_err(|err| ConfigError::parse(label.as_str(), err))?;
    schema::validate_layer_schema(&value, SchemaMode::Partial, &label)?;
    merge::canonicalize_keys(&mut value, &label)?;
    utils::resolve_layer_paths(&mut value, path.parent());
    debug!(
        "config layer loaded (source={}, path={})",
        source.as_str(),
        path.display()
    );
    Ok(LoadedLayer {
        meta: ConfigLayer {
            source,
            path: Some(path.to_path_buf()),
        },
        label,
        value,
    })
}
