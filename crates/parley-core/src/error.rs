//! Error types for envelope decoding.

use thiserror::Error;

/// Errors that can occur while turning raw input into envelopes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The input was not a valid update object.
    #[error("failed to decode update: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for envelope operations.
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;
