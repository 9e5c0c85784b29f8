//! Status observers and the presence-change filter.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hostwatch_probe::Presence;
use tracing::trace;

/// Receives every status a monitor produces for one target.
#[async_trait]
pub trait Observer<S>: Send + Sync {
    async fn notify(&self, status: S);
}

#[async_trait]
impl<S, O> Observer<S> for Arc<O>
where
    S: Send + 'static,
    O: Observer<S> + ?Sized,
{
    async fn notify(&self, status: S) {
        (**self).notify(status).await
    }
}

/// Forwards a status only when its presence differs from the last
/// forwarded one.
///
/// The previous presence is seeded from persisted state, so a restart does
/// not repeat the last notification.
pub struct PresenceFilter<O> {
    inner: O,
    previous: Mutex<Option<bool>>,
}

impl<O> PresenceFilter<O> {
    pub fn new(inner: O, previous: Option<bool>) -> Self {
        Self {
            inner,
            previous: Mutex::new(previous),
        }
    }

    /// The last forwarded presence.
    pub fn previous(&self) -> Option<bool> {
        *self.previous.lock().expect("presence lock poisoned")
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }
}

#[async_trait]
impl<S, O> Observer<S> for PresenceFilter<O>
where
    S: Presence + Send + 'static,
    O: Observer<S>,
{
    async fn notify(&self, status: S) {
        let alive = status.is_alive();
        let changed = {
            let mut previous = self.previous.lock().expect("presence lock poisoned");
            if *previous == Some(alive) {
                false
            } else {
                *previous = Some(alive);
                true
            }
        };
        if changed {
            self.inner.notify(status).await;
        } else {
            trace!(alive, "presence unchanged");
        }
    }
}
