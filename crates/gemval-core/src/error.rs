//! Error taxonomy for standard-GEM validation.

use std::path::PathBuf;

use gemval_provider::ProviderError;

/// Startup configuration errors. Raised before any network activity.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingCredential(&'static str),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Errors that abort a repository pass.
#[derive(Debug, thiserror::Error)]
pub enum GemvalError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record {}: {message}", path.display())]
    MalformedRecord { path: PathBuf, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("a check named {0} is already registered")]
    DuplicateCheck(String),
}

impl GemvalError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GemvalError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for gemval operations.
pub type Result<T> = std::result::Result<T, GemvalError>;
