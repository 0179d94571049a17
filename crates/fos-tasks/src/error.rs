//! Scheduler errors

use std::io;

/// Errors raised while building pools or the scheduler
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn worker thread for pool '{pool}': {source}")]
    ThreadSpawn {
        pool: String,
        #[source]
        source: io::Error,
    },
}

/// Result alias for scheduler construction
pub type Result<T> = std::result::Result<T, SchedulerError>;
