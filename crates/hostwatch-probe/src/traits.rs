//! The probe abstraction shared by every monitor kind.

use async_trait::async_trait;

/// A reachability check against one kind of target.
///
/// Probes never fail: an unreachable target is reported through a negative
/// status, not an error.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    /// What is probed (host, port, address family, ...).
    type Target: Clone + Send + Sync + 'static;

    /// The outcome of a single probe.
    type Status: Clone + Send + 'static;

    /// Probe `target` once.
    async fn probe(&self, target: &Self::Target) -> Self::Status;
}

/// Statuses that carry a presence bit.
pub trait Presence {
    fn is_alive(&self) -> bool;
}
