use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::spawn_blocking;

use crate::error::{LogFilesError, Result};

/// Bounds how many leaf tasks (single-file reads, single-host queries) run at
/// once. Orchestrating tasks never hold a permit, so nested fan-out cannot
/// starve the pool.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::with_available_parallelism()
    }
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn with_available_parallelism() -> Self {
        let size = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(4);
        Self::new(size)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs blocking file work on the blocking thread pool.
    pub async fn run_blocking<F, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self.acquire().await?;
        spawn_blocking(work)
            .await
            .map_err(|err| LogFilesError::Internal(format!("worker task failed: {err}")))?
    }

    pub async fn run<F>(&self, work: F) -> Result<F::Output>
    where
        F: Future,
    {
        let _permit = self.acquire().await?;
        Ok(work.await)
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LogFilesError::Internal("worker pool closed".to_string()))
    }
}
