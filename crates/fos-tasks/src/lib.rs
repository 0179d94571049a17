//! fOS Tasks
//!
//! Multi-pool task scheduler for the engine's frame loop.
//!
//! # Pools
//! - Small pool: short CPU-bound work, and game logic
//! - Large pool: longer work, and serialized file tasks
//! - Main-thread queue: drained once per frame by the main thread
//!
//! Game-logic tasks form a barrier: the main-thread drain waits until all
//! of them have finished. File tasks run one at a time, in the order they
//! were scheduled.
//!
//! # Example
//! ```rust,no_run
//! use fos_tasks::{SchedulerConfig, TaskScheduler, TaskType};
//!
//! let scheduler = TaskScheduler::new(SchedulerConfig::default())?;
//!
//! scheduler.schedule_simple(TaskType::GameLogic, || {
//!     // update simulation
//! });
//! scheduler.schedule(TaskType::MainThread, |ctx| {
//!     assert_eq!(ctx.task_type(), TaskType::MainThread);
//! });
//!
//! // Once per frame, on the main thread.
//! scheduler.execute_main_thread_tasks();
//! # Ok::<(), fos_tasks::SchedulerError>(())
//! ```

mod barrier;
mod config;
mod context;
mod error;
mod file_queue;
mod host;
mod main_thread;
mod pool;
mod scheduler;
mod task;

pub use barrier::WaitCondition;
pub use config::SchedulerConfig;
pub use context::TaskContext;
pub use error::{Result, SchedulerError};
pub use host::{
    CapturedMainThread, DelegatedMainThread, DeviceInfo, FixedDevice, MainThreadIdentity,
    SystemDevice,
};
pub use main_thread::MainThreadTaskPool;
pub use pool::{ThreadPool, WorkFn};
pub use scheduler::{PoolStats, SchedulerStats, TaskScheduler};
pub use task::{SimpleTask, Task, TaskType, from_simple, task};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
