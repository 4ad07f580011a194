//! Runtime error types.

use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors raised by an [`UpdateSource`](crate::UpdateSource).
#[derive(Error, Debug)]
pub enum SourceError {
    /// The source could not be read.
    #[error("Failed to read updates: {0}")]
    Io(#[from] std::io::Error),

    /// An update could not be decoded.
    #[error("Failed to decode update: {0}")]
    Decode(#[from] parley_core::EnvelopeError),

    /// The upstream service rejected the request.
    #[error("Update request rejected: {0}")]
    Rejected(String),
}

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Fetching updates failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The builder was not given an update source.
    #[error("No update source configured")]
    MissingSource,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
