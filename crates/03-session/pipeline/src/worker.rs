//! Thread pool plumbing shared by the send and receive drivers.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::{PipelineError, PipelineResult};

/// How long a driver blocks on a channel before rechecking cancellation and
/// worker health.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Caller-held handle that stops a running pipeline.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Spawned workers plus the stop flag they poll and the first failure any
/// of them reported.
pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<String>>>,
}

impl WorkerPool {
    pub(crate) fn new() -> Self {
        Self {
            handles: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Shared flag workers check between units of work.
    pub(crate) fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Spawns `body` on a named thread. An `Err` return or a panic is
    /// recorded as the pool failure and stops the other workers.
    pub(crate) fn spawn<F>(&mut self, name: String, body: F) -> PipelineResult<()>
    where
        F: FnOnce() -> PipelineResult<()> + Send + 'static,
    {
        let failure = Arc::clone(&self.failure);
        let stop = Arc::clone(&self.stop);
        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                let outcome = match panic::catch_unwind(AssertUnwindSafe(body)) {
                    Ok(Ok(())) => return,
                    Ok(Err(err)) => err.to_string(),
                    Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
                };
                error!(worker = %thread_name, reason = %outcome, "worker failed");
                stop.store(true, Ordering::Release);
                failure.lock().get_or_insert(format!("{thread_name}: {outcome}"));
            })
            .map_err(|err| PipelineError::producer(format!("cannot spawn worker: {err}")))?;
        self.handles.push(handle);
        Ok(())
    }

    pub(crate) fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }

    pub(crate) fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Joins every worker. Returns the first recorded failure.
    pub(crate) fn join(self) -> PipelineResult<()> {
        let count = self.handles.len();
        for handle in self.handles {
            // panics are caught inside the worker
            let _ = handle.join();
        }
        debug!(workers = count, "workers joined");
        match self.failure.lock().take() {
            Some(reason) => Err(PipelineError::ProducerFailed(reason)),
            None => Ok(()),
        }
    }
}

#[inline]
pub(crate) fn stopped(flag: &AtomicBool) -> bool {
    flag.load(Ordering::Acquire)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
