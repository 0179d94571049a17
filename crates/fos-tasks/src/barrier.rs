//! Completion Barriers
//!
//! [`GameLogicCounter`] tracks in-flight game-logic tasks so the main thread
//! can wait for them before draining its own queue. [`WaitCondition`] is a
//! counting latch for callers that need to block on a known number of tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Count of in-flight game-logic tasks
#[derive(Debug, Default)]
pub(crate) struct GameLogicCounter {
    in_flight: AtomicUsize,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl GameLogicCounter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Called when a game-logic task is submitted
    pub(crate) fn begin(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    /// Called when a game-logic task has returned
    pub(crate) fn end(&self) {
        let previous = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "game-logic counter underflow");

        if previous == 1 {
            // Taking the lock orders this notify after any waiter that saw a
            // non-zero count has gone to sleep.
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.condvar.notify_all();
        }
    }

    /// Block until no game-logic task is queued or running
    pub(crate) fn wait_until_idle(&self) {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            guard = self
                .condvar
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Counting latch.
///
/// Created with the number of notifications to expect; [`wait`](Self::wait)
/// blocks until all of them have arrived.
#[derive(Debug)]
pub struct WaitCondition {
    remaining: Mutex<usize>,
    condvar: Condvar,
}

impl WaitCondition {
    /// Create a latch that opens after `count` notifications
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            condvar: Condvar::new(),
        }
    }

    /// Record one completion. Extra notifications are ignored.
    pub fn notify(&self) {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            self.condvar.notify_all();
        }
    }

    /// Block until every expected notification has arrived
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        while *remaining > 0 {
            remaining = self
                .condvar
                .wait(remaining)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block for at most `timeout`. Returns `true` if the latch opened.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);

        while *remaining > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            remaining = self
                .condvar
                .wait_timeout(remaining, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Notifications still outstanding
    pub fn remaining(&self) -> usize {
        *self.remaining.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the latch has opened
    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }
}
