//! Host Environment
//!
//! Seams to the platform: how many cores the device has, and which thread
//! is the logical main thread.

use std::thread::{self, ThreadId};

/// Device capability query used to size the worker pools
pub trait DeviceInfo: Send + Sync {
    /// Number of logical CPU cores
    fn num_cpu_cores(&self) -> usize;
}

/// Device info read from the running system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDevice;

impl DeviceInfo for SystemDevice {
    fn num_cpu_cores(&self) -> usize {
        thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4)
    }
}

/// Device with a fixed core count
#[derive(Debug, Clone, Copy)]
pub struct FixedDevice(pub usize);

impl DeviceInfo for FixedDevice {
    fn num_cpu_cores(&self) -> usize {
        self.0
    }
}

/// Answers whether the calling thread is the main thread.
///
/// Exactly one thread may ever answer `true`.
pub trait MainThreadIdentity: Send + Sync {
    fn is_main_thread(&self) -> bool;
}

/// Main thread recorded as a thread id
#[derive(Debug, Clone, Copy)]
pub struct CapturedMainThread {
    id: ThreadId,
}

impl CapturedMainThread {
    /// Record the calling thread as main
    pub fn current() -> Self {
        Self {
            id: thread::current().id(),
        }
    }

    /// Recorded thread id
    pub fn id(&self) -> ThreadId {
        self.id
    }
}

impl MainThreadIdentity for CapturedMainThread {
    fn is_main_thread(&self) -> bool {
        thread::current().id() == self.id
    }
}

/// Main thread identified by a platform callback.
///
/// For platforms where the thread that builds the scheduler is not the one
/// the application lifecycle runs on.
pub struct DelegatedMainThread {
    check: Box<dyn Fn() -> bool + Send + Sync>,
}

impl DelegatedMainThread {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            check: Box::new(check),
        }
    }
}

impl std::fmt::Debug for DelegatedMainThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatedMainThread").finish_non_exhaustive()
    }
}

impl MainThreadIdentity for DelegatedMainThread {
    fn is_main_thread(&self) -> bool {
        (self.check)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, OnceLock};

    #[test]
    fn test_system_device_has_cores() {
        assert!(SystemDevice.num_cpu_cores() >= 1);
        assert_eq!(FixedDevice(12).num_cpu_cores(), 12);
    }

    #[test]
    fn test_captured_main_thread() {
        let main = CapturedMainThread::current();
        assert!(main.is_main_thread());
        assert_eq!(main.id(), thread::current().id());

        let other = thread::spawn(move || main.is_main_thread()).join().unwrap();
        assert!(!other);
    }

    #[test]
    fn test_delegated_main_thread() {
        // Platform registers its main thread later than the scheduler starts.
        let registered: Arc<OnceLock<ThreadId>> = Arc::new(OnceLock::new());
        let lookup = Arc::clone(&registered);
        let main = DelegatedMainThread::new(move || {
            lookup.get() == Some(&thread::current().id())
        });

        assert!(!main.is_main_thread());

        let main = Arc::new(main);
        let platform_main = Arc::clone(&main);
        let platform = Arc::clone(&registered);
        let answer = thread::spawn(move || {
            let _ = platform.set(thread::current().id());
            platform_main.is_main_thread()
        })
        .join()
        .unwrap();

        assert!(answer);
        assert!(!main.is_main_thread());
    }
}
