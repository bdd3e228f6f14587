//! Configuration error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while assembling process configuration
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("invalid value for {name}: {message}")]
    InvalidVar { name: String, message: String },

    #[error("failed to read {name} from {}: {source}", path.display())]
    SecretFile {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
