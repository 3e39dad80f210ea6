//! Error types for the capture pipeline

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing
#[derive(Error, Debug)]
pub enum Error {
    /// A target at the given batch position has no hosting document.
    /// Detected before any sandbox is created; the whole batch is rejected.
    #[error("target at position {0} is not attached to a document")]
    MissingDocument(usize),

    /// The result hook asked to stop after the result at the given position
    #[error("capture was stopped by the result hook after position {0}")]
    Vetoed(usize),

    /// Failed to produce a snapshot of the target subtree
    #[error("snapshot failed: {0}")]
    CloneError(String),

    /// Failed to create or load the rendering sandbox
    #[error("sandbox failed: {0}")]
    SandboxError(String),

    /// The paint engine failed to produce pixels
    #[error("paint failed: {0}")]
    PaintError(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
