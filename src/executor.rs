/*! Named executors: serial dispatch queues for work that must leave
the frame-processing path.

Each executor owns one worker thread draining a job queue in FIFO
order.  The registry is an explicit collaborator (created by the
application, passed where needed), not a process-wide singleton.
*/

use crate::error::ExecutorError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;
use tracing::*;

type Job = Box<dyn FnOnce() + Send>;

struct ExecutorHandle {
    tx: Sender<Job>,
    thread_id: ThreadId,
    join: Mutex<Option<JoinHandle<()>>>,
}

type Registry = Mutex<HashMap<String, Arc<ExecutorHandle>>>;

/// The executor registry.
#[derive(Clone, Default)]
pub struct Executors {
    inner: Arc<Registry>,
}

impl Executors {
    pub fn new() -> Executors {
        Executors::default()
    }

    /// Spawn a new executor thread under `name`.  The returned guard
    /// destroys the executor when dropped; jobs already queued still
    /// run to completion first.
    pub fn register(&self, name: &str) -> Result<ExecutorGuard, ExecutorError> {
        let mut map = self.inner.lock();
        if map.contains_key(name) {
            return Err(ExecutorError::DuplicateExecutorName);
        }
        let (tx, rx) = unbounded::<Job>();
        let (id_tx, id_rx) = crossbeam_channel::bounded(1);
        let thread_name = format!("executor-{name}");
        let join = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let _ = id_tx.send(std::thread::current().id());
                run_loop(rx);
            })
            .expect("failed to spawn executor thread");
        let thread_id = id_rx
            .recv()
            .expect("executor thread died before reporting its id");
        map.insert(
            name.to_owned(),
            Arc::new(ExecutorHandle {
                tx,
                thread_id,
                join: Mutex::new(Some(join)),
            }),
        );
        debug!("registered executor {name}");
        Ok(ExecutorGuard {
            name: name.to_owned(),
            registry: Arc::downgrade(&self.inner),
        })
    }

    /// Queue a job.  Unknown names are ignored silently.
    pub fn push_job(&self, name: &str, job: impl FnOnce() + Send + 'static) {
        let handle = self.inner.lock().get(name).cloned();
        if let Some(handle) = handle {
            let _ = handle.tx.send(Box::new(job));
        }
    }

    /// Run `job` on the named executor and wait for its value.
    ///
    /// Called from the executor's own thread, the job runs inline
    /// (waiting would deadlock).  A panicking job propagates its panic
    /// to the caller.
    pub fn wait_job_response<R: Send + 'static>(
        &self,
        name: &str,
        job: impl FnOnce() -> R + Send + 'static,
        timeout: Option<Duration>,
    ) -> Result<R, ExecutorError> {
        let handle = self
            .inner
            .lock()
            .get(name)
            .cloned()
            .ok_or(ExecutorError::UnknownExecutor)?;

        if std::thread::current().id() == handle.thread_id {
            return Ok(job());
        }

        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let sent = handle.tx.send(Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(job));
            let _ = result_tx.send(outcome);
        }));
        if sent.is_err() {
            return Err(ExecutorError::UnknownExecutor);
        }
        let outcome = match timeout {
            Some(timeout) => result_rx
                .recv_timeout(timeout)
                .map_err(|_| ExecutorError::Timeout)?,
            None => result_rx.recv().map_err(|_| ExecutorError::Timeout)?,
        };
        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => resume_unwind(panic),
        }
    }

    /// The thread id the named executor runs on.
    pub fn executor_thread_id(&self, name: &str) -> Option<ThreadId> {
        self.inner.lock().get(name).map(|h| h.thread_id)
    }
}

fn run_loop(rx: Receiver<Job>) {
    for job in rx.iter() {
        // A panicking job must not take the executor down with it.
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!("executor job panicked");
        }
    }
}

/// Owns a registered executor; dropping it destroys the executor after
/// draining already-queued jobs.
pub struct ExecutorGuard {
    name: String,
    registry: Weak<Registry>,
}

impl ExecutorGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ExecutorGuard {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let handle = registry.lock().remove(&self.name);
        if let Some(handle) = handle {
            // Disconnect the queue, then wait for the drain.
            let join = handle.join.lock().take();
            drop(handle);
            if let Some(join) = join {
                let _ = join.join();
            }
        }
    }
}
