//! Write coalescing.
//!
//! Writes update the cache immediately and register a completion. The first
//! write of a cycle spawns one flush task on the current Tokio runtime. Only
//! current-thread runtimes are accepted, so the task runs once the writing
//! task yields and every write issued before that point lands in the same
//! `store` call. Writes arriving while a store is in
//! flight are held for a follow-up cycle that starts as soon as the current
//! one completes. At most one store per tree is in flight at any time.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{PersistError, PersistResult};
use crate::object::TreeCore;

type Waiter = oneshot::Sender<PersistResult<()>>;

#[derive(Debug, Default)]
struct CycleState {
    flush_scheduled: bool,
    store_in_progress: bool,
    waiters: Vec<Waiter>,
    flushes: u64,
}

/// Per-tree coalescing state, shared by the root and all nested objects.
#[derive(Debug, Default)]
pub(crate) struct WriteCoalescer {
    state: Mutex<CycleState>,
}

impl WriteCoalescer {
    fn state(&self) -> MutexGuard<'_, CycleState> {
        self.state.lock().expect("coalescer lock poisoned")
    }

    /// Register a write completion. Returns `true` when the caller must
    /// spawn the flush task for a new cycle.
    pub(crate) fn enqueue(&self, waiter: Waiter) -> bool {
        let mut state = self.state();
        state.waiters.push(waiter);
        if state.flush_scheduled || state.store_in_progress {
            false
        } else {
            state.flush_scheduled = true;
            true
        }
    }

    fn begin_cycle(&self) -> Vec<Waiter> {
        let mut state = self.state();
        state.flush_scheduled = false;
        state.store_in_progress = true;
        mem::take(&mut state.waiters)
    }

    /// Close the current cycle. Returns `true` if writes queued up during
    /// the store and another cycle must run.
    fn finish_cycle(&self) -> bool {
        let mut state = self.state();
        state.flushes += 1;
        if state.waiters.is_empty() {
            state.store_in_progress = false;
            false
        } else {
            true
        }
    }

    /// Number of completed flushes.
    pub(crate) fn flush_count(&self) -> u64 {
        self.state().flushes
    }

    /// No flush scheduled and none in flight.
    pub(crate) fn is_idle(&self) -> bool {
        let state = self.state();
        !state.flush_scheduled && !state.store_in_progress
    }
}

/// Drain coalescing cycles until no writes are left.
pub(crate) async fn run_flush(core: Arc<TreeCore>) {
    loop {
        let waiters = core.coalescer.begin_cycle();
        let (snapshot, generation) = core.cache().snapshot();
        debug!(writes = waiters.len(), generation, "flushing state");

        let result = match core.storage.store(snapshot).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, writes = waiters.len(), "store failed");
                Err(PersistError::Store(Arc::new(e)))
            }
        };
        core.cache().settle(generation);

        let again = core.coalescer.finish_cycle();
        for waiter in waiters {
            // The writer may have dropped its completion; that is fine.
            let _ = waiter.send(result.clone());
        }
        if !again {
            break;
        }
    }
}

#[derive(Debug)]
enum Completion {
    Pending(oneshot::Receiver<PersistResult<()>>),
    Done(Option<PersistResult<()>>),
}

/// Resolves once the flush carrying a write has completed.
///
/// The write itself is already visible in the cache when this is returned;
/// dropping it does not cancel the write.
#[must_use = "the write is applied either way; await this to observe its flush"]
#[derive(Debug)]
pub struct WriteCompletion {
    inner: Completion,
}

impl WriteCompletion {
    pub(crate) fn pending(receiver: oneshot::Receiver<PersistResult<()>>) -> Self {
        Self {
            inner: Completion::Pending(receiver),
        }
    }

    pub(crate) fn failed(error: PersistError) -> Self {
        Self {
            inner: Completion::Done(Some(Err(error))),
        }
    }
}

impl Future for WriteCompletion {
    type Output = PersistResult<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            Completion::Pending(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(PersistError::FlushAborted))),
            Completion::Done(result) => {
                Poll::Ready(result.take().unwrap_or(Err(PersistError::FlushAborted)))
            }
        }
    }
}
