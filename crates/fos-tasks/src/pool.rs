//! Thread Pool
//!
//! Fixed-size pool of worker threads pulling boxed work from one shared
//! queue. Workers pick items up in roughly FIFO order; completion order is
//! unconstrained.

use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::error::{Result, SchedulerError};

/// Work item type
pub type WorkFn = Box<dyn FnOnce() + Send + 'static>;

struct QueueState {
    items: VecDeque<WorkFn>,
    shutdown: bool,
}

/// Queue shared between a pool and its workers.
///
/// Tasks hold on to this (never to the pool itself) so they can feed child
/// work back into the pool that runs them.
pub(crate) struct WorkerQueue {
    name: String,
    state: Mutex<QueueState>,
    condvar: Condvar,
    /// Items currently executing, on workers or helping threads
    active: AtomicUsize,
}

impl WorkerQueue {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                shutdown: false,
            }),
            condvar: Condvar::new(),
            active: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue work. Dropped with a warning once shutdown has begun.
    pub(crate) fn push(&self, work: WorkFn) {
        let mut state = self.lock();
        if state.shutdown {
            drop(state);
            tracing::warn!(pool = %self.name, "pool is shutting down, dropping work item");
            return;
        }
        state.items.push_back(work);
        drop(state);
        self.condvar.notify_one();
    }

    /// Block until work is available. `None` once shutdown has begun.
    fn wait_for_work(&self) -> Option<WorkFn> {
        let mut state = self.lock();

        loop {
            if state.shutdown {
                return None;
            }

            if let Some(work) = state.items.pop_front() {
                self.active.fetch_add(1, Ordering::SeqCst);
                return Some(work);
            }

            state = self
                .condvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Run one queued item on the calling thread, if there is one.
    pub(crate) fn try_perform_task(&self) -> bool {
        let work = {
            let mut state = self.lock();
            let work = state.items.pop_front();
            if work.is_some() {
                self.active.fetch_add(1, Ordering::SeqCst);
            }
            work
        };

        match work {
            Some(work) => {
                self.run(work);
                true
            }
            None => false,
        }
    }

    fn run(&self, work: WorkFn) {
        run_or_abort(&self.name, work);
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Stop accepting work and drop everything not yet started.
    ///
    /// Returns the number of abandoned items.
    fn shutdown(&self) -> usize {
        let abandoned = {
            let mut state = self.lock();
            state.shutdown = true;
            std::mem::take(&mut state.items)
        };
        self.condvar.notify_all();
        abandoned.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Run one task body, aborting the process if it panics.
///
/// No scheduler lock is held while `work` runs, so a panic cannot leave a
/// queue half-updated. It is still fatal, for every task type.
pub(crate) fn run_or_abort<F: FnOnce()>(runner: &str, work: F) {
    if panic::catch_unwind(AssertUnwindSafe(work)).is_err() {
        tracing::error!(runner, "task panicked; task bodies must not panic, aborting");
        std::process::abort();
    }
}

struct Worker {
    id: usize,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("running", &self.thread.is_some())
            .finish()
    }
}

impl Worker {
    fn spawn(id: usize, queue: &Arc<WorkerQueue>) -> io::Result<Self> {
        let queue = Arc::clone(queue);
        let thread = thread::Builder::new()
            .name(format!("{}-{}", queue.name(), id))
            .spawn(move || {
                while let Some(work) = queue.wait_for_work() {
                    queue.run(work);
                }
            })?;

        Ok(Self {
            id,
            thread: Some(thread),
        })
    }
}

/// Fixed-size thread pool
pub struct ThreadPool {
    /// Worker threads
    workers: Vec<Worker>,
    /// Shared work queue
    queue: Arc<WorkerQueue>,
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.queue.name())
            .field("workers", &self.workers)
            .field("pending_tasks", &self.pending_tasks())
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}

impl ThreadPool {
    /// Create a pool named `name` with `worker_count` live threads.
    ///
    /// Worker threads are named `{name}-{index}`.
    pub fn new(name: &str, worker_count: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(SchedulerError::InvalidConfig(format!(
                "pool '{name}' needs at least one worker"
            )));
        }

        let queue = Arc::new(WorkerQueue::new(name));
        let workers = (0..worker_count)
            .map(|id| Worker::spawn(id, &queue))
            .collect::<io::Result<Vec<_>>>();

        let workers = match workers {
            Ok(workers) => workers,
            Err(source) => {
                // Workers that did start exit once they see the shutdown flag.
                queue.shutdown();
                return Err(SchedulerError::ThreadSpawn {
                    pool: name.to_string(),
                    source,
                });
            }
        };

        tracing::debug!(pool = name, workers = worker_count, "thread pool started");

        Ok(Self { workers, queue })
    }

    /// Submit work. Returns immediately.
    pub fn add<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Box::new(work));
    }

    /// Run one queued item on the calling thread, if any is waiting.
    ///
    /// Returns `true` if an item ran.
    pub fn try_perform_task(&self) -> bool {
        self.queue.try_perform_task()
    }

    pub(crate) fn queue(&self) -> &Arc<WorkerQueue> {
        &self.queue
    }

    /// Pool name
    pub fn name(&self) -> &str {
        self.queue.name()
    }

    /// Get worker count
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Get pending task count
    pub fn pending_tasks(&self) -> usize {
        self.queue.len()
    }

    /// Get active task count
    pub fn active_tasks(&self) -> usize {
        self.queue.active()
    }

    /// Check if pool is idle
    pub fn is_idle(&self) -> bool {
        self.pending_tasks() == 0 && self.active_tasks() == 0
    }

    /// Shut the pool down.
    ///
    /// Stops accepting work, abandons queued items that have not started,
    /// and joins every worker once its in-flight item finishes.
    pub fn shutdown(&mut self) {
        if self.workers.iter().all(|w| w.thread.is_none()) {
            return;
        }

        let abandoned = self.queue.shutdown();
        let current = thread::current().id();

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                // A task that owned the last handle to the pool drops it on a
                // worker; that worker cannot join itself.
                if thread.thread().id() == current {
                    continue;
                }
                let _ = thread.join();
            }
        }

        tracing::debug!(pool = %self.queue.name(), abandoned, "thread pool stopped");
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Poll `done` until it holds or `timeout` expires.
#[cfg(test)]
pub(crate) fn wait_until(timeout: std::time::Duration, done: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(std::time::Duration::from_millis(1));
    }
    done()
}
