use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading, merging, or validating memex config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config layer could not be read from disk.
    #[error("failed to read config layer {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A layer is not valid JSON5.
    #[error("failed to parse {layer}: {source}")]
    Parse {
        layer: String,
        #[source]
        source: json5::Error,
    },
    /// The merged document does not deserialize into `MemexConfig`.
    #[error("failed to decode memex config: {0}")]
    Decode(#[from] serde_json::Error),
    /// A key has the wrong type, an unknown name, or an out-of-range value.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// Cross-field constraint violation.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(layer: impl Into<String>, source: json5::Error) -> Self {
        Self::Parse {
            layer: layer.into(),
            source,
        }
    }
}
