//! Persisted per-target presence.

use std::sync::Arc;

use hostwatch_persist::{
    FieldValue, PersistOptions, PersistentObject, Schema, StorageAdapter, WriteCompletion,
};

use crate::error::MonitorResult;

const IS_ALIVE: &str = "isAlive";
const CHECKED: &str = "checked";

/// Last known presence of a target and when it last changed.
///
/// Backed by an exclusive [`PersistentObject`]: the record is read once and
/// then served from memory.
#[derive(Debug)]
pub struct HostState {
    object: PersistentObject,
}

impl HostState {
    /// `{ isAlive: boolean, checked: number }`, `checked` in epoch
    /// milliseconds.
    pub fn schema() -> Schema {
        Schema::new().boolean(IS_ALIVE).number(CHECKED)
    }

    pub fn open(storage: Arc<dyn StorageAdapter>) -> MonitorResult<Self> {
        let object = PersistentObject::new(Self::schema(), PersistOptions::exclusive(storage))?;
        Ok(Self { object })
    }

    /// Last recorded presence, if any.
    pub async fn is_alive(&self) -> MonitorResult<Option<bool>> {
        let value = self.object.get(IS_ALIVE).await?;
        Ok(value.as_ref().and_then(FieldValue::as_bool))
    }

    /// Epoch milliseconds of the last recorded change, if any.
    pub async fn checked(&self) -> MonitorResult<Option<i64>> {
        let value = self.object.get(CHECKED).await?;
        Ok(value
            .as_ref()
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|ms| ms as i64))))
    }

    /// Record a presence observed at `at_ms`. Both fields are stored by one
    /// flush; the completion resolves when it lands.
    pub fn record(&self, alive: bool, at_ms: i64) -> WriteCompletion {
        // Same flush as the write below, whose completion reports for both.
        drop(self.object.set(CHECKED, at_ms));
        self.object.set(IS_ALIVE, alive)
    }

    /// The cached record.
    pub fn snapshot(&self) -> serde_json::Value {
        self.object.snapshot()
    }
}
