//! Fixed-interval probe scheduling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use hostwatch_probe::Probe;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::{MonitorError, MonitorResult};
use crate::observer::Observer;

/// Runs one probe job per registered target.
///
/// Each job probes as soon as it is registered and then once per interval,
/// handing every status to its observer. A job's next probe never starts
/// before the previous notification has finished. Dropping the monitor
/// cancels every job.
pub struct Monitor<P: Probe> {
    probe: Arc<P>,
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl<P: Probe> Monitor<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe: Arc::new(probe),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.jobs.lock().expect("monitor jobs lock poisoned")
    }

    /// Start probing `target` under `id`.
    ///
    /// Returns `false` without side effects if `id` is already registered.
    pub fn register(
        &self,
        id: impl Into<String>,
        target: P::Target,
        every: Duration,
        observer: Arc<dyn Observer<P::Status>>,
    ) -> MonitorResult<bool> {
        let id = id.into();
        if every.is_zero() {
            return Err(MonitorError::ZeroInterval(id));
        }
        let runtime = Handle::try_current().map_err(|_| MonitorError::NoRuntime)?;

        let mut jobs = self.jobs();
        if jobs.contains_key(&id) {
            debug!(id = %id, "already registered");
            return Ok(false);
        }

        let probe = Arc::clone(&self.probe);
        let job_id = id.clone();
        let handle = runtime.spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let status = probe.probe(&target).await;
                debug!(id = %job_id, "probe finished");
                observer.notify(status).await;
            }
        });

        info!(id = %id, interval_secs = every.as_secs_f64(), "monitor registered");
        jobs.insert(id, handle);
        Ok(true)
    }

    /// Stop probing `id`. Returns whether a job was running.
    pub fn unregister(&self, id: &str) -> bool {
        match self.jobs().remove(id) {
            Some(handle) => {
                handle.abort();
                info!(id, "monitor unregistered");
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.jobs().contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }
}

impl<P: Probe> Drop for Monitor<P> {
    fn drop(&mut self) {
        let jobs = self.jobs.get_mut().map(|jobs| jobs.drain().collect::<Vec<_>>());
        for (_, handle) in jobs.unwrap_or_default() {
            handle.abort();
        }
    }
}

impl<P: Probe> std::fmt::Debug for Monitor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor").field("jobs", &self.ids()).finish()
    }
}
