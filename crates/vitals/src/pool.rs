//! Dedicated worker pool for fanned-out health checks.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{HealthError, HealthResult};

/// Default number of worker threads.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Fixed-size pool of worker threads running health check tasks.
///
/// An owned pool runs its own multi-thread runtime and is torn down by
/// [`shutdown`](WorkerPool::shutdown) without waiting for outstanding tasks.
/// A borrowed pool spawns onto an existing runtime and never shuts it down.
pub struct WorkerPool {
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    size: usize,
}

impl WorkerPool {
    /// Start an owned pool with `size` worker threads.
    pub fn new(size: usize) -> HealthResult<Self> {
        if size == 0 {
            return Err(HealthError::InvalidConfig(
                "worker pool size must be positive".to_string(),
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(size)
            .thread_name_fn(|| {
                static NEXT_ID: AtomicUsize = AtomicUsize::new(1);
                format!("vitals-worker-{}", NEXT_ID.fetch_add(1, Ordering::SeqCst))
            })
            .enable_all()
            .build()
            .map_err(|e| HealthError::Pool(e.to_string()))?;

        info!(size, "Started health check worker pool");

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            size,
        })
    }

    /// Borrow the runtime the caller is running on.
    ///
    /// Panics when called outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::from_handle(Handle::current())
    }

    /// Borrow an existing runtime.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            runtime: Mutex::new(None),
            size: 0,
        }
    }

    /// Number of owned worker threads, zero for a borrowed pool.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Handle for spawning onto the pool.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawn a task onto the pool.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Whether the pool still owns a running runtime.
    pub fn is_owned(&self) -> bool {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Tear down an owned pool without waiting for outstanding tasks.
    ///
    /// Idempotent. Outstanding tasks are dropped at their next yield point.
    pub fn shutdown(&self) {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(runtime) = runtime {
            debug!(size = self.size, "Shutting down health check worker pool");
            runtime.shutdown_background();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
