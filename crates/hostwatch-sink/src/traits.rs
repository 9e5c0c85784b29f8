//! The sink abstraction.

use async_trait::async_trait;

/// Somewhere a rendered notification can be delivered.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Deliver `message`. Returns whether delivery succeeded.
    async fn flush(&self, message: &str) -> bool;
}
