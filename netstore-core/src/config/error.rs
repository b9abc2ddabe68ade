//! Errors of loading, overriding and validating a [`Config`](super::Config)
//!
//! Every variant names what failed: the file path, the setting key, or the
//! offending authorized key, so the CLI can print it as is.

use std::path::PathBuf;
use thiserror::Error;

use crate::core_store::store::StoreError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    /// An environment override that does not parse
    #[error("{var}={value:?}: {reason}")]
    InvalidValue {
        var: String,
        value: String,
        reason: String,
    },

    /// A setting outside the range the node can run with
    #[error("{key} {reason}")]
    OutOfRange { key: &'static str, reason: &'static str },

    #[error("authorized_public_keys entry {key:?}: {source}")]
    AuthorizedKey {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("logging.level: {0}")]
    LogLevel(String),
}
