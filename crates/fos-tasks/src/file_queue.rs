//! File Task Queue
//!
//! Runs file tasks on the large pool one at a time, in submission order.
//! There is no dedicated thread: the task that finishes launches the next
//! one, and the queue is idle again once it finds nothing left.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::context::TaskContext;
use crate::pool::WorkerQueue;
use crate::task::{Task, TaskType};

struct FileQueueState {
    pending: VecDeque<Task>,
    /// A file task is queued on, or running in, the large pool
    running: bool,
}

/// Single-flight FIFO of file tasks
pub(crate) struct FileTaskQueue {
    state: Mutex<FileQueueState>,
    pool: Arc<WorkerQueue>,
}

impl FileTaskQueue {
    pub(crate) fn new(pool: Arc<WorkerQueue>) -> Self {
        Self {
            state: Mutex::new(FileQueueState {
                pending: VecDeque::new(),
                running: false,
            }),
            pool,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FileQueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `task` now if no file task is in flight, otherwise queue it
    pub(crate) fn schedule(self: &Arc<Self>, task: Task) {
        {
            let mut state = self.lock();
            if state.running {
                state.pending.push_back(task);
                tracing::trace!(queued = state.pending.len(), "file task queued");
                return;
            }
            state.running = true;
        }

        self.launch(task);
    }

    fn launch(self: &Arc<Self>, task: Task) {
        let queue = Arc::clone(self);
        self.pool.push(Box::new(move || {
            task(&TaskContext::new(TaskType::File, None));

            if let Some(next) = queue.take_next() {
                queue.launch(next);
            }
        }));
    }

    /// Pop the next task, or mark the queue idle if there is none.
    ///
    /// Both happen under one lock acquisition so a task scheduled between
    /// "queue empty" and "flag cleared" cannot be stranded.
    fn take_next(&self) -> Option<Task> {
        let mut state = self.lock();
        let next = state.pending.pop_front();
        if next.is_none() {
            state.running = false;
            tracing::trace!("file queue idle");
        }
        next
    }

    /// Queued file tasks, not counting the one in flight
    pub(crate) fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Drop every queued file task without running it.
    pub(crate) fn clear(&self) -> usize {
        let pending = std::mem::take(&mut self.lock().pending);
        pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{ThreadPool, wait_until};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_file_tasks_run_in_order() {
        let pool = ThreadPool::new("file-order", 4).unwrap();
        let queue = Arc::new(FileTaskQueue::new(Arc::clone(pool.queue())));
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20 {
            let order = Arc::clone(&order);
            queue.schedule(Box::new(move |ctx: &TaskContext<'_>| {
                assert_eq!(ctx.task_type(), TaskType::File);
                order.lock().unwrap().push(i);
            }));
        }

        assert!(wait_until(Duration::from_secs(5), || order.lock().unwrap().len() == 20));
        assert_eq!(*order.lock().unwrap(), (0..20).collect::<Vec<_>>());
        assert!(wait_until(Duration::from_secs(5), || !queue.is_running()));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_file_tasks_never_overlap() {
        let pool = ThreadPool::new("file-overlap", 4).unwrap();
        let queue = Arc::new(FileTaskQueue::new(Arc::clone(pool.queue())));
        let inside = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let submitters: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let inside = Arc::clone(&inside);
                let overlaps = Arc::clone(&overlaps);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let inside = Arc::clone(&inside);
                        let overlaps = Arc::clone(&overlaps);
                        let done = Arc::clone(&done);
                        queue.schedule(Box::new(move |_: &TaskContext<'_>| {
                            if inside.swap(true, Ordering::SeqCst) {
                                overlaps.fetch_add(1, Ordering::SeqCst);
                            }
                            thread::sleep(Duration::from_micros(200));
                            inside.store(false, Ordering::SeqCst);
                            done.fetch_add(1, Ordering::SeqCst);
                        }));
                    }
                })
            })
            .collect();

        for submitter in submitters {
            submitter.join().unwrap();
        }

        assert!(wait_until(Duration::from_secs(10), || done.load(Ordering::SeqCst) == 40));
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clear_drops_queued_tasks() {
        let pool = ThreadPool::new("file-clear", 1).unwrap();
        let queue = Arc::new(FileTaskQueue::new(Arc::clone(pool.queue())));
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let ran = Arc::new(AtomicUsize::new(0));

        queue.schedule(Box::new(move |_: &TaskContext<'_>| {
            let _ = release_rx.recv();
        }));
        for _ in 0..3 {
            let ran = Arc::clone(&ran);
            queue.schedule(Box::new(move |_: &TaskContext<'_>| {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.clear(), 3);
        release_tx.send(()).unwrap();

        assert!(wait_until(Duration::from_secs(5), || !queue.is_running()));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
