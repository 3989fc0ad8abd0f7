//! Bounded-concurrency worker pool
//!
//! At most `max_concurrent` jobs run at once, one semaphore permit each;
//! further jobs wait in FIFO order. A worker that finishes a job keeps its
//! permit for the next waiting one, so a slot is never released while work
//! is waiting.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error};

/// Boxed job future
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Worker pool handle (cheap to clone)
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    max_concurrent: usize,
    permits: Arc<Semaphore>,
    // Permits are taken and returned only under this lock, so a job can
    // never sit here while a permit is free.
    waiting: Mutex<VecDeque<Job>>,
    idle: Notify,
}

impl PoolInner {
    fn running(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_concurrent", &self.inner.max_concurrent)
            .field("running", &self.pending())
            .field("waiting", &self.size())
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool running at most `max_concurrent` jobs (minimum 1)
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner: Arc::new(PoolInner {
                max_concurrent,
                permits: Arc::new(Semaphore::new(max_concurrent)),
                waiting: Mutex::new(VecDeque::new()),
                idle: Notify::new(),
            }),
        }
    }

    /// Submit a job unless the pool is at capacity
    ///
    /// The job starts right away when a permit is free, otherwise it waits as
    /// long as fewer than `max_waiting` jobs are already waiting. The
    /// capacity check and the enqueue happen under one lock.
    ///
    /// Returns the number of waiting jobs after submission, or the job back
    /// when rejected. Must be called from within a Tokio runtime.
    pub fn try_submit(&self, job: Job, max_waiting: usize) -> Result<usize, Job> {
        let mut waiting = self.inner.waiting.lock();

        if let Ok(permit) = Arc::clone(&self.inner.permits).try_acquire_owned() {
            let size = waiting.len();
            drop(waiting);

            tokio::spawn(run_worker(Arc::clone(&self.inner), permit, job));
            return Ok(size);
        }

        if waiting.len() < max_waiting {
            waiting.push_back(job);
            return Ok(waiting.len());
        }

        Err(job)
    }

    /// Jobs waiting for a slot
    pub fn size(&self) -> usize {
        self.inner.waiting.lock().len()
    }

    /// Jobs currently running
    pub fn pending(&self) -> usize {
        self.inner.running()
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Nothing running and nothing waiting
    pub fn is_idle(&self) -> bool {
        let waiting = self.inner.waiting.lock();
        waiting.is_empty() && self.inner.running() == 0
    }

    /// Resolve once the pool is idle
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

/// Run `job`, then keep draining waiting jobs with the same permit
async fn run_worker(inner: Arc<PoolInner>, permit: OwnedSemaphorePermit, mut job: Job) {
    loop {
        // Each job runs in its own task so a panic cannot take the slot down
        if let Err(e) = tokio::spawn(job).await {
            error!(error = %e, "worker job aborted");
        }

        let mut waiting = inner.waiting.lock();
        match waiting.pop_front() {
            Some(next) => job = next,
            None => {
                drop(permit);
                let idle = inner.running() == 0;
                drop(waiting);

                if idle {
                    debug!("worker pool idle");
                    inner.idle.notify_waiters();
                }
                return;
            }
        }
    }
}
