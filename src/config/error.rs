use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while reading, writing or editing session configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration in {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f32 },

    #[error("Unknown unit '{0}' (expected one of mm, cm, m, in, ft)")]
    UnknownUnit(String),

    #[error("Unknown scanner source '{0}'")]
    UnknownSource(String),
}
