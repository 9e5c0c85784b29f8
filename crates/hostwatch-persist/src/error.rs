//! Error types for the persistence layer.

use std::sync::Arc;

use thiserror::Error;

use crate::value::FieldKind;

/// Errors raised by a [`StorageAdapter`](crate::StorageAdapter) while storing.
///
/// Load failures never surface as errors: adapters report them as an absent
/// snapshot.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error from the underlying medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backend refused the write.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors detected while building a schema.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A field was declared with an empty name.
    #[error("empty field name in {path}")]
    EmptyFieldName { path: String },

    /// Two fields of one node expose the same member name.
    #[error("member name {name} in {path} is claimed by both {first} and {second}")]
    AccessorCollision {
        path: String,
        name: String,
        first: String,
        second: String,
    },

    /// A JSON schema description could not be understood.
    #[error("invalid schema description at {path}: {reason}")]
    InvalidDescription { path: String, reason: String },
}

/// Result alias for schema construction.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors returned by persistent object operations.
#[derive(Debug, Clone, Error)]
pub enum PersistError {
    /// The field is not declared in the object's schema.
    #[error("unknown field {field} in {path}")]
    UnknownField { path: String, field: String },

    /// The accessor name does not match any member of the object.
    #[error("unknown accessor {name} in {path}")]
    UnknownAccessor { path: String, name: String },

    /// A read or write addressed a composite field.
    #[error("field {field} in {path} is a nested object, not a value")]
    NotALeaf { path: String, field: String },

    /// A nested object was requested for a leaf field.
    #[error("field {field} in {path} is a value, not a nested object")]
    NotComposite { path: String, field: String },

    /// The written value does not match the declared kind.
    #[error("field {field} in {path} expects {expected}, got {found}")]
    TypeMismatch {
        path: String,
        field: String,
        expected: FieldKind,
        found: FieldKind,
    },

    /// The flush carrying this write failed. Shared by every write of the cycle.
    #[error("store failed: {0}")]
    Store(Arc<StorageError>),

    /// The flush task was dropped before reporting (runtime shut down).
    #[error("flush aborted before completion")]
    FlushAborted,

    /// Writes need a Tokio runtime to schedule their flush.
    #[error("no async runtime available to schedule a flush")]
    NoRuntime,

    /// Writes were issued from a multi-threaded runtime, where the deferred
    /// flush could start before the writer yields.
    #[error("writes require a current-thread runtime (or a LocalSet on one)")]
    MultiThreadRuntime,
}

/// Result alias for persistent object operations.
pub type PersistResult<T> = Result<T, PersistError>;
