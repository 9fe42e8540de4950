//! Bounded worker pool shared by the raster and vector pipelines.

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::Result;

/// Runs parallel work either on rayon's global pool (one worker per CPU
/// core) or on a dedicated pool with a fixed number of threads.
pub struct WorkerPool {
    pool: Option<ThreadPool>,
}

impl WorkerPool {
    /// Create a pool. `num_threads == 0` uses the global pool.
    pub fn new(num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Ok(Self { pool: None });
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("hexgrid-worker-{}", i))
            .build()?;
        debug!(num_threads, "Built dedicated worker pool");
        Ok(Self { pool: Some(pool) })
    }

    /// Run `op` inside the pool so that rayon parallel iterators used by it
    /// are bounded by this pool's workers.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Number of workers available to `install`ed work.
    pub fn current_num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("dedicated", &self.pool.is_some())
            .field("num_threads", &self.current_num_threads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_dedicated_pool_size() {
        let pool = WorkerPool::new(2).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
        let inside = pool.install(rayon::current_num_threads);
        assert_eq!(inside, 2);
    }

    #[test]
    fn test_global_pool() {
        let pool = WorkerPool::new(0).unwrap();
        assert!(pool.current_num_threads() >= 1);
        let sum: u64 = pool.install(|| (1..=100u64).into_par_iter().sum());
        assert_eq!(sum, 5050);
    }
}
