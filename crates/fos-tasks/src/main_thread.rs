//! Main Thread Task Pool
//!
//! Buffers tasks that must run on the main thread. Nothing runs until the
//! main thread drains the buffer with [`MainThreadTaskPool::perform_tasks`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::context::TaskContext;
use crate::pool::run_or_abort;
use crate::task::{Task, TaskType};

/// Queue of tasks drained by the main thread
#[derive(Default)]
pub struct MainThreadTaskPool {
    tasks: Mutex<Vec<Task>>,
}

impl std::fmt::Debug for MainThreadTaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThreadTaskPool")
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}

impl MainThreadTaskPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a task. Callable from any thread.
    pub fn add(&self, task: Task) {
        self.lock().push(task);
    }

    /// Run every task queued before this call, in the order they were added.
    ///
    /// Tasks added while the drain is running wait for the next call.
    /// Returns the number of tasks run.
    pub fn perform_tasks(&self) -> usize {
        let tasks = std::mem::take(&mut *self.lock());
        let count = tasks.len();

        let context = TaskContext::new(TaskType::MainThread, None);
        for task in tasks {
            run_or_abort(TaskType::MainThread.name(), || task(&context));
        }

        count
    }

    /// Get pending task count
    pub fn pending_tasks(&self) -> usize {
        self.lock().len()
    }

    /// Drop every buffered task without running it.
    pub(crate) fn clear(&self) -> usize {
        let tasks = std::mem::take(&mut *self.lock());
        tasks.len()
    }
}
