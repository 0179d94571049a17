//! Task Context
//!
//! Handed to every task body for the duration of one invocation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::barrier::WaitCondition;
use crate::pool::WorkerQueue;
use crate::task::{Task, TaskType};

/// Identity of a running task and access to the pool it runs on.
///
/// Only the scheduler creates contexts, so the type and the pool always
/// agree. The lifetime ties a context to the invocation it was made for.
#[derive(Clone, Copy)]
pub struct TaskContext<'a> {
    task_type: TaskType,
    pool: Option<&'a Arc<WorkerQueue>>,
}

impl std::fmt::Debug for TaskContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("task_type", &self.task_type)
            .field("pool", &self.pool.map(|q| q.name()))
            .finish()
    }
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(task_type: TaskType, pool: Option<&'a Arc<WorkerQueue>>) -> Self {
        Self { task_type, pool }
    }

    /// Type the task was scheduled under
    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Whether child tasks go to a worker pool
    pub fn has_pool(&self) -> bool {
        self.pool.is_some()
    }

    /// Name of the pool running this task, if any
    pub fn pool_name(&self) -> Option<&str> {
        self.pool.map(|q| q.name())
    }

    /// Run `tasks` as children of the current task and return once all of
    /// them have finished.
    ///
    /// Children inherit this task's type. On a pool, idle workers may pick
    /// them up while the calling thread runs the rest itself, then waits
    /// for any still running elsewhere. The caller never runs unrelated
    /// pool work, so nesting only grows with nested child sets. Children
    /// still run if the pool shuts down meanwhile. Without a pool they run
    /// inline, in order.
    pub fn process_child_tasks(&self, tasks: Vec<Task>) {
        let Some(queue) = self.pool else {
            for task in tasks {
                task(self);
            }
            return;
        };

        if tasks.is_empty() {
            return;
        }

        let count = tasks.len();
        let children = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let latch = Arc::new(WaitCondition::new(count));
        let task_type = self.task_type;

        // One claim per child. A claim that finds the list empty does nothing.
        for _ in 0..count {
            let children = Arc::clone(&children);
            let latch = Arc::clone(&latch);
            let child_queue = Arc::clone(queue);
            queue.push(Box::new(move || {
                if let Some(task) = claim(&children) {
                    task(&TaskContext::new(task_type, Some(&child_queue)));
                    latch.notify();
                }
            }));
        }

        while let Some(task) = claim(&children) {
            task(self);
            latch.notify();
        }
        latch.wait();
    }
}

fn claim(children: &Mutex<VecDeque<Task>>) -> Option<Task> {
    children
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ThreadPool;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn counting_children(count: usize, hits: &Arc<AtomicUsize>) -> Vec<Task> {
        (0..count)
            .map(|_| {
                let hits = Arc::clone(hits);
                Box::new(move |ctx: &TaskContext<'_>| {
                    assert_eq!(ctx.task_type(), TaskType::Small);
                    hits.fetch_add(1, Ordering::SeqCst);
                }) as Task
            })
            .collect()
    }

    #[test]
    fn test_children_finish_before_parent_returns() {
        // A single worker: the parent must help or the children never run.
        let pool = ThreadPool::new("ctx-single", 1).unwrap();
        let queue = Arc::clone(pool.queue());
        let hits = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        let parent_hits = Arc::clone(&hits);
        pool.add(move || {
            let ctx = TaskContext::new(TaskType::Small, Some(&queue));
            ctx.process_child_tasks(counting_children(8, &parent_hits));
            let _ = tx.send(parent_hits.load(Ordering::SeqCst));
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 8);
    }

    #[test]
    fn test_children_spread_over_pool() {
        let pool = ThreadPool::new("ctx-multi", 3).unwrap();
        let queue = Arc::clone(pool.queue());
        let hits = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        let parent_hits = Arc::clone(&hits);
        pool.add(move || {
            let ctx = TaskContext::new(TaskType::Small, Some(&queue));
            assert_eq!(ctx.pool_name(), Some("ctx-multi"));
            ctx.process_child_tasks(counting_children(64, &parent_hits));
            let _ = tx.send(parent_hits.load(Ordering::SeqCst));
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 64);
    }

    #[test]
    fn test_waiting_parent_never_runs_other_parents() {
        const PARENTS: usize = 5_000;

        thread_local! {
            static PARENT_DEPTH: Cell<usize> = const { Cell::new(0) };
        }

        let pool = ThreadPool::new("ctx-parents", 2).unwrap();
        let max_depth = Arc::new(AtomicUsize::new(0));
        let hits = Arc::new(AtomicUsize::new(0));
        let latch = Arc::new(WaitCondition::new(PARENTS));

        for _ in 0..PARENTS {
            let queue = Arc::clone(pool.queue());
            let max_depth = Arc::clone(&max_depth);
            let hits = Arc::clone(&hits);
            let latch = Arc::clone(&latch);
            pool.add(move || {
                let depth = PARENT_DEPTH.with(|d| {
                    d.set(d.get() + 1);
                    d.get()
                });
                max_depth.fetch_max(depth, Ordering::SeqCst);

                let ctx = TaskContext::new(TaskType::Small, Some(&queue));
                ctx.process_child_tasks(counting_children(1, &hits));

                PARENT_DEPTH.with(|d| d.set(d.get() - 1));
                latch.notify();
            });
        }

        assert!(latch.wait_timeout(Duration::from_secs(30)));
        assert_eq!(hits.load(Ordering::SeqCst), PARENTS);
        assert_eq!(max_depth.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_children_finish_when_pool_shuts_down() {
        let mut pool = ThreadPool::new("ctx-stop", 2).unwrap();
        let queue = Arc::clone(pool.queue());
        let hits = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let parent_hits = Arc::clone(&hits);
        pool.add(move || {
            let children: Vec<Task> = (0..4)
                .map(|_| {
                    let hits = Arc::clone(&parent_hits);
                    Box::new(move |_: &TaskContext<'_>| {
                        thread::sleep(Duration::from_millis(20));
                        hits.fetch_add(1, Ordering::SeqCst);
                    }) as Task
                })
                .collect();

            let _ = started_tx.send(());
            let ctx = TaskContext::new(TaskType::Large, Some(&queue));
            ctx.process_child_tasks(children);
            let _ = done_tx.send(parent_hits.load(Ordering::SeqCst));
        });

        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        pool.shutdown();

        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 4);
    }

    #[test]
    fn test_children_run_inline_without_pool() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let tasks: Vec<Task> = (0..4)
            .map(|i| {
                let order = Arc::clone(&order);
                Box::new(move |ctx: &TaskContext<'_>| {
                    assert_eq!(ctx.task_type(), TaskType::File);
                    order.lock().unwrap().push((i, thread::current().id()));
                }) as Task
            })
            .collect();

        let ctx = TaskContext::new(TaskType::File, None);
        assert!(!ctx.has_pool());
        ctx.process_child_tasks(tasks);

        let order = order.lock().unwrap();
        let ids: Vec<_> = order.iter().map(|(i, _)| *i).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert!(order.iter().all(|(_, t)| *t == thread::current().id()));
    }

    #[test]
    fn test_empty_children_return_immediately() {
        let pool = ThreadPool::new("ctx-empty", 1).unwrap();
        let ctx = TaskContext::new(TaskType::Large, Some(pool.queue()));
        ctx.process_child_tasks(Vec::new());
        assert!(pool.is_idle());
    }
}
