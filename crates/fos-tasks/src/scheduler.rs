//! Task Scheduler
//!
//! Process entry point for background and main-thread work. Owns the small
//! and large worker pools, the main-thread queue and the file queue, and
//! routes each task by its [`TaskType`]:
//!
//! | Type         | Runs on          | Ordering                              |
//! |--------------|------------------|---------------------------------------|
//! | `Small`      | small pool       | none                                  |
//! | `Large`      | large pool       | none                                  |
//! | `MainThread` | main-thread drain| FIFO within one drain                 |
//! | `GameLogic`  | small pool       | all finish before the next drain      |
//! | `File`       | large pool       | one at a time, in submission order    |

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::barrier::GameLogicCounter;
use crate::config::SchedulerConfig;
use crate::context::TaskContext;
use crate::error::Result;
use crate::file_queue::FileTaskQueue;
use crate::host::{CapturedMainThread, DeviceInfo, MainThreadIdentity, SystemDevice};
use crate::main_thread::MainThreadTaskPool;
use crate::pool::{ThreadPool, WorkerQueue};
use crate::task::{SimpleTask, Task, TaskType, from_simple};

/// State reachable from running tasks, so they can route follow-up work
/// without a handle to the scheduler itself.
struct SchedulerShared {
    small: Arc<WorkerQueue>,
    large: Arc<WorkerQueue>,
    main_thread: MainThreadTaskPool,
    files: Arc<FileTaskQueue>,
    game_logic: Arc<GameLogicCounter>,
}

impl SchedulerShared {
    fn schedule(self: &Arc<Self>, task_type: TaskType, task: Task) {
        tracing::trace!(task_type = task_type.name(), "scheduling task");

        match task_type {
            TaskType::Small => Self::run_on(&self.small, TaskType::Small, task),
            TaskType::Large => Self::run_on(&self.large, TaskType::Large, task),
            TaskType::MainThread => self.main_thread.add(task),
            TaskType::GameLogic => {
                self.game_logic.begin();
                let counter = Arc::clone(&self.game_logic);
                let queue = Arc::clone(&self.small);
                self.small.push(Box::new(move || {
                    task(&TaskContext::new(TaskType::GameLogic, Some(&queue)));
                    counter.end();
                }));
            }
            TaskType::File => self.files.schedule(task),
        }
    }

    fn run_on(queue: &Arc<WorkerQueue>, task_type: TaskType, task: Task) {
        let own_queue = Arc::clone(queue);
        queue.push(Box::new(move || {
            task(&TaskContext::new(task_type, Some(&own_queue)));
        }));
    }

    fn schedule_batch(self: &Arc<Self>, task_type: TaskType, tasks: Vec<Task>, completion: Option<Task>) {
        if tasks.is_empty() {
            if let Some(completion) = completion {
                self.schedule(task_type, completion);
            }
            return;
        }

        let remaining = Arc::new(AtomicUsize::new(tasks.len()));
        let completion = Arc::new(Mutex::new(completion));

        for task in tasks {
            let remaining = Arc::clone(&remaining);
            let completion = Arc::clone(&completion);
            let shared = Arc::clone(self);

            self.schedule(
                task_type,
                Box::new(move |ctx: &TaskContext<'_>| {
                    task(ctx);

                    if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                        let completion = completion
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .take();
                        if let Some(completion) = completion {
                            shared.schedule(task_type, completion);
                        }
                    }
                }),
            );
        }
    }
}

/// Pool load snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub pending: usize,
    pub active: usize,
}

impl PoolStats {
    fn of(pool: &ThreadPool) -> Self {
        Self {
            workers: pool.worker_count(),
            pending: pool.pending_tasks(),
            active: pool.active_tasks(),
        }
    }
}

/// Scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub small: PoolStats,
    pub large: PoolStats,
    /// Tasks waiting for the next main-thread drain
    pub main_thread_pending: usize,
    /// Game-logic tasks queued or running
    pub game_logic_in_flight: usize,
    /// File tasks queued behind the one in flight
    pub file_pending: usize,
    /// Whether a file task is queued on, or running in, the large pool
    pub file_running: bool,
}

/// Multi-pool task scheduler.
///
/// Build one with [`TaskScheduler::new`] on the thread that will drain
/// main-thread work, and share it (`Arc<TaskScheduler>`) with tasks that
/// schedule further work.
pub struct TaskScheduler {
    small: ThreadPool,
    large: ThreadPool,
    shared: Arc<SchedulerShared>,
    main_thread: Box<dyn MainThreadIdentity>,
    stopped: bool,
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("small", &self.small)
            .field("large", &self.large)
            .field("main_thread_pool", &self.shared.main_thread)
            .field("game_logic_in_flight", &self.shared.game_logic.in_flight())
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl TaskScheduler {
    /// Start the scheduler, sized from the system's core count.
    ///
    /// The calling thread becomes the main thread.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Self::with_host(config, &SystemDevice, Box::new(CapturedMainThread::current()))
    }

    /// Start the scheduler with platform-provided device info and
    /// main-thread identity.
    pub fn with_host(
        config: SchedulerConfig,
        device: &dyn DeviceInfo,
        main_thread: Box<dyn MainThreadIdentity>,
    ) -> Result<Self> {
        config.validate()?;

        let cores = device.num_cpu_cores();
        let threads = config.resolve_threads_per_pool(cores);
        if let Some(requested) = config.threads_per_pool {
            if requested != threads {
                tracing::warn!(requested, threads, "threads_per_pool raised to the configured minimum");
            }
        }

        let small = ThreadPool::new(&config.pool_name("small"), threads)?;
        let large = ThreadPool::new(&config.pool_name("large"), threads)?;

        let shared = Arc::new(SchedulerShared {
            small: Arc::clone(small.queue()),
            large: Arc::clone(large.queue()),
            main_thread: MainThreadTaskPool::new(),
            files: Arc::new(FileTaskQueue::new(Arc::clone(large.queue()))),
            game_logic: Arc::new(GameLogicCounter::new()),
        });

        tracing::info!(cores, threads_per_pool = threads, "task scheduler started");

        Ok(Self {
            small,
            large,
            shared,
            main_thread,
            stopped: false,
        })
    }

    /// Schedule a task under `task_type`. Never blocks.
    pub fn schedule_task(&self, task_type: TaskType, task: Task) {
        self.shared.schedule(task_type, task);
    }

    /// Schedule a closure that takes its context
    pub fn schedule<F>(&self, task_type: TaskType, task: F)
    where
        F: for<'a> FnOnce(&TaskContext<'a>) + Send + 'static,
    {
        self.schedule_task(task_type, Box::new(task));
    }

    /// Schedule a task that does not need its context
    pub fn schedule_simple_task(&self, task_type: TaskType, task: SimpleTask) {
        self.schedule_task(task_type, from_simple(task));
    }

    /// Schedule a context-free closure
    pub fn schedule_simple<F>(&self, task_type: TaskType, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_simple_task(task_type, Box::new(task));
    }

    /// Schedule every task in `tasks` under `task_type`.
    ///
    /// `completion`, if given, is scheduled under the same type once every
    /// task in the batch has returned. An empty batch schedules the
    /// completion task straight away.
    pub fn schedule_tasks(&self, task_type: TaskType, tasks: Vec<Task>, completion: Option<Task>) {
        self.shared.schedule_batch(task_type, tasks, completion);
    }

    /// Whether the calling thread is the main thread
    pub fn is_main_thread(&self) -> bool {
        self.main_thread.is_main_thread()
    }

    /// Run pending main-thread tasks. Call once per frame from the main
    /// thread.
    ///
    /// Blocks until every game-logic task has finished, then runs the
    /// main-thread tasks queued so far. Returns how many ran.
    ///
    /// # Panics
    ///
    /// Panics when called from any thread other than the main thread.
    pub fn execute_main_thread_tasks(&self) -> usize {
        assert!(
            self.is_main_thread(),
            "execute_main_thread_tasks called off the main thread"
        );

        self.shared.game_logic.wait_until_idle();
        self.shared.main_thread.perform_tasks()
    }

    /// Workers in each of the small and large pools
    pub fn threads_per_pool(&self) -> usize {
        self.small.worker_count()
    }

    /// Get scheduler stats
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            small: PoolStats::of(&self.small),
            large: PoolStats::of(&self.large),
            main_thread_pending: self.shared.main_thread.pending_tasks(),
            game_logic_in_flight: self.shared.game_logic.in_flight(),
            file_pending: self.shared.files.pending(),
            file_running: self.shared.files.is_running(),
        }
    }

    /// Stop the scheduler.
    ///
    /// Tasks already running finish; tasks not yet started are dropped
    /// without running. Dropping the scheduler does the same.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        // Empty the file queue first so the in-flight file task finds
        // nothing to relaunch.
        let file_abandoned = self.shared.files.clear();
        self.small.shutdown();
        self.large.shutdown();
        let main_abandoned = self.shared.main_thread.clear();

        tracing::debug!(file_abandoned, main_abandoned, "abandoned unstarted tasks");
        tracing::info!("task scheduler stopped");
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
