//! Error types for notification sinks.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    /// Transport failure talking to a remote API.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with `ok: false`.
    #[error("{method} failed: {description}")]
    Api { method: String, description: String },

    /// A sink references credentials that are not configured.
    #[error("unknown credentials '{0}'")]
    MissingCredentials(String),
}

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;
