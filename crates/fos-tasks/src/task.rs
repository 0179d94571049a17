//! Task Types
//!
//! Work units accepted by the scheduler and the categories that route them.

use crate::context::TaskContext;

/// Task body. Receives the context of the invocation it runs in.
///
/// Task bodies must not panic; a panicking task aborts the process.
pub type Task = Box<dyn for<'a> FnOnce(&TaskContext<'a>) + Send + 'static>;

/// Task body that does not need its context
pub type SimpleTask = Box<dyn FnOnce() + Send + 'static>;

/// Box a closure as a [`Task`]
pub fn task<F>(f: F) -> Task
where
    F: for<'a> FnOnce(&TaskContext<'a>) + Send + 'static,
{
    Box::new(f)
}

/// Adapt a [`SimpleTask`] into a [`Task`] that ignores its context
pub fn from_simple(simple: SimpleTask) -> Task {
    Box::new(move |_: &TaskContext<'_>| simple())
}

/// Task category. Decides which pool runs a task and under which rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// Short CPU-bound work on the small pool
    Small,
    /// Coarser or longer-running work on the large pool
    Large,
    /// Work that only runs when the main thread drains its queue
    MainThread,
    /// Small pool work that must finish before the next main-thread drain
    GameLogic,
    /// Large pool work, serialized: one at a time in submission order
    File,
}

impl TaskType {
    /// Every task type
    pub const ALL: [TaskType; 5] = [
        Self::Small,
        Self::Large,
        Self::MainThread,
        Self::GameLogic,
        Self::File,
    ];

    /// Get type name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Large => "large",
            Self::MainThread => "main-thread",
            Self::GameLogic => "game-logic",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
