//! Schema-driven persistent state cache for hostwatch.
//!
//! A [`PersistentObject`] is an instance of a declared [`Schema`] whose leaf
//! fields are read and written through generated accessors while the whole
//! tree is persisted as one JSON record by a [`StorageAdapter`].
//!
//! # Behaviour
//!
//! - Reads are lazy. In [`ConsistencyMode::Exclusive`] a field is loaded at
//!   most until it is initialized; in [`ConsistencyMode::Shared`] every read
//!   reloads the record first.
//! - Writes are eager and coalesced. All writes issued before the writing
//!   task yields reach storage in a single `store` call, and at most one
//!   store per tree is in flight. The flush is a task on the current
//!   runtime, so writes must come from a current-thread Tokio runtime;
//!   a multi-threaded runtime could start it before the writer yields.
//! - Nested composites are objects of their own, addressed by path into the
//!   same record. A write below the root flushes the whole tree.
//!
//! # Storage Backends
//!
//! - [`InMemoryStorage`] -- in-process record for tests and embedding
//! - [`FileStorage`] -- one JSON file per record, replaced atomically
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use hostwatch_persist::{InMemoryStorage, PersistOptions, PersistentObject, Schema};
//!
//! let schema = Schema::new().boolean("isAlive").number("checked");
//! let state = PersistentObject::new(
//!     schema,
//!     PersistOptions::exclusive(Arc::new(InMemoryStorage::new())),
//! )?;
//!
//! state.set("isAlive", true).await?;
//! let alive = state.member("GetIsAlive")?.into_read().unwrap().call().await?;
//! # let _ = alive;
//! # Ok(())
//! # }
//! ```

pub mod accessor;
pub mod cache;
mod coalescer;
pub mod error;
pub mod file;
pub mod memory;
pub mod object;
pub mod schema;
pub mod storage_id;
pub mod traits;
pub mod value;

// Re-export primary types at crate root for ergonomic imports.
pub use accessor::{read_accessor_name, write_accessor_name, AccessorKind, AccessorTable, Binding};
pub use cache::{ConsistencyMode, FieldCache};
pub use coalescer::WriteCompletion;
pub use error::{
    PersistError, PersistResult, SchemaError, SchemaResult, StorageError, StorageResult,
};
pub use file::FileStorage;
pub use memory::InMemoryStorage;
pub use object::{Member, PersistOptions, PersistentObject, ReadAccessor, WriteAccessor};
pub use schema::{Schema, SchemaNode};
pub use storage_id::storage_id;
pub use traits::StorageAdapter;
pub use value::{FieldKind, FieldValue};
