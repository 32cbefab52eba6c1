use thiserror::Error;
use std::path::PathBuf;

/// The main result type for messages-core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Enum representing possible errors within the messages-core library.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(u64),

    #[error("I/O error accessing path {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl CoreError {
    /// Shorthand for attaching the offending path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::IoError { path: path.into(), source }
    }
}
