//! Scheduler Configuration

use crate::error::{Result, SchedulerError};

/// Scheduler configuration options
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed worker count for each pool. `None` derives it from the core count.
    /// Still raised to `min_threads_per_pool`.
    pub threads_per_pool: Option<usize>,

    /// Lower bound on the derived worker count
    pub min_threads_per_pool: usize,

    /// Cores kept free for the main and render threads
    pub reserved_cores: usize,

    /// Prefix for worker thread names (`{prefix}-small-0`, ...)
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            threads_per_pool: None,
            min_threads_per_pool: 2,
            reserved_cores: 2,
            thread_name_prefix: "fos".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Use `count` workers per pool
    pub fn with_threads_per_pool(mut self, count: usize) -> Self {
        self.threads_per_pool = Some(count);
        self
    }

    /// Set the lower bound on derived worker counts
    pub fn with_min_threads_per_pool(mut self, count: usize) -> Self {
        self.min_threads_per_pool = count;
        self
    }

    /// Set how many cores to leave free
    pub fn with_reserved_cores(mut self, count: usize) -> Self {
        self.reserved_cores = count;
        self
    }

    /// Set the worker thread name prefix
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Check the configuration can build a scheduler
    pub fn validate(&self) -> Result<()> {
        if self.threads_per_pool == Some(0) {
            return Err(SchedulerError::InvalidConfig(
                "threads_per_pool must be at least 1".to_string(),
            ));
        }
        if self.min_threads_per_pool == 0 {
            return Err(SchedulerError::InvalidConfig(
                "min_threads_per_pool must be at least 1".to_string(),
            ));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Workers per pool on a device with `cores` logical cores:
    /// `max(min_threads_per_pool, cores - reserved_cores)`.
    pub fn resolve_threads_per_pool(&self, cores: usize) -> usize {
        let wanted = match self.threads_per_pool {
            Some(count) => count,
            None => cores.saturating_sub(self.reserved_cores),
        };
        wanted.max(self.min_threads_per_pool)
    }

    /// Name of the pool for `kind` ("small" or "large")
    pub(crate) fn pool_name(&self, kind: &str) -> String {
        format!("{}-{}", self.thread_name_prefix, kind)
    }
}
