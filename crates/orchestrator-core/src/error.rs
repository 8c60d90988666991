//! Fatal startup error types.

use thiserror::Error;

/// Errors that abort process startup. All of these are logged and the
/// process exits non-zero; none are recoverable at runtime.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file at `CONFIG_MASTER` could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The config file was not valid JSON, or was missing/mistyped a field.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The config parsed but violated a structural invariant (e.g. an empty VM pool).
    #[error("invalid config: {0}")]
    Invalid(String),
}
