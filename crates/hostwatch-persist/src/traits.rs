//! The [`StorageAdapter`] trait: the single load/store pair a persistent
//! object tree is backed by.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageResult;

/// Load/store access to one serialized state record.
///
/// The record mirrors the root schema: nested objects nested, only field
/// values present. Adapters may be shared by several independent object
/// trees; shared consistency mode exists for exactly that case.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Return the last stored snapshot.
    ///
    /// Returns `None` when nothing was stored yet or the medium cannot be
    /// read. Read failures are never propagated.
    async fn load(&self) -> Option<Value>;

    /// Persist a full snapshot, replacing the previous one.
    async fn store(&self, state: Value) -> StorageResult<()>;
}
