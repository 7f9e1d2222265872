//! Task pool for background work
//!
//! A dedicated multi-threaded tokio runtime whose blocking workers run
//! jobs handed to [`TaskPool::flow`]. Results are collected with
//! [`TaskHandle::wait`] from synchronous code or [`TaskHandle::join`]
//! from async code.

use crate::error::{EngineError, Result};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// Handle to a job started with [`TaskPool::flow`]
#[derive(Debug)]
pub struct TaskHandle<T> {
    inner: JoinHandle<T>,
}

impl<T> TaskHandle<T> {
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Block the calling thread until the job finishes
    pub fn wait(self) -> Result<T> {
        futures::executor::block_on(self.join())
    }

    pub async fn join(self) -> Result<T> {
        self.inner
            .await
            .map_err(|e| EngineError::Task(e.to_string()))
    }
}

pub struct TaskPool {
    /// Taken only on drop
    runtime: Option<Runtime>,
    handle: Handle,
    workers: usize,
}

impl TaskPool {
    pub fn new(workers: usize) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(workers)
            .thread_name("osp-flow")
            .enable_all()
            .build()
            .map_err(|e| EngineError::Task(e.to_string()))?;

        tracing::debug!(workers, "started task pool");
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Start `job` on a pool worker
    pub fn flow<F, T>(&self, job: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        TaskHandle {
            inner: self.handle.spawn_blocking(job),
        }
    }

    /// Block until a job finishes
    pub fn wait<T>(&self, handle: TaskHandle<T>) -> Result<T> {
        handle.wait()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        // Dropping a runtime inside async code panics; background shutdown does not.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("workers", &self.workers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_and_wait() {
        let pool = TaskPool::new(2).unwrap();
        let handle = pool.flow(|| 21 * 2);
        assert_eq!(pool.wait(handle).unwrap(), 42);
    }

    #[test]
    fn test_panicking_job_is_an_error() {
        let pool = TaskPool::new(1).unwrap();
        let handle = pool.flow(|| -> u32 { panic!("boom") });
        assert!(matches!(pool.wait(handle), Err(EngineError::Task(_))));
    }

    #[tokio::test]
    async fn test_join_from_async() {
        let pool = TaskPool::new(1).unwrap();
        let handle = pool.flow(|| "done".to_string());
        assert_eq!(handle.join().await.unwrap(), "done");
    }
}
