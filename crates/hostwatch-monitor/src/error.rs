//! Error types for monitors and registration.

use hostwatch_config::ConfigError;
use hostwatch_persist::{PersistError, SchemaError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Reading or writing host state failed.
    #[error("state error: {0}")]
    Persist(#[from] PersistError),

    /// The host state schema was rejected.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Settings needed for registration are invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// No registrator handles this monitor kind.
    #[error("no registrator for monitor kind '{0}'")]
    UnknownKind(String),

    /// A registrator was handed a watch of another kind.
    #[error("registrator '{expected}' cannot handle '{found}' watches")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A job would probe in a busy loop.
    #[error("probe interval for '{0}' must be positive")]
    ZeroInterval(String),

    /// Jobs can only be scheduled from inside a Tokio runtime.
    #[error("no Tokio runtime available to schedule probes")]
    NoRuntime,
}

/// Result type for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;
