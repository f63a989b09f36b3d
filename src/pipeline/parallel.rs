// =============================================================================
// Bounded worker pool
// =============================================================================
//
// Per-observation work inside a stage is independent.  `WorkerPool::map` runs
// it on a rayon pool capped at `worker_limit` threads and returns results in
// input order, so callers never depend on scheduling.  The pool is built once
// per pipeline and reused by every run.
// =============================================================================

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, warn};

pub struct WorkerPool {
    /// `None` runs everything inline on the calling thread.
    pool: Option<ThreadPool>,
    worker_limit: usize,
}

impl WorkerPool {
    /// `worker_limit <= 1` never spawns threads.
    pub fn new(worker_limit: usize) -> Self {
        let worker_limit = worker_limit.max(1);
        if worker_limit == 1 {
            return Self::inline();
        }

        match rayon::ThreadPoolBuilder::new()
            .num_threads(worker_limit)
            .thread_name(|i| format!("sentry-worker-{i}"))
            .build()
        {
            Ok(pool) => {
                debug!(worker_limit, "worker pool started");
                Self {
                    pool: Some(pool),
                    worker_limit,
                }
            }
            Err(e) => {
                warn!(error = %e, worker_limit, "failed to build worker pool, running inline");
                Self::inline()
            }
        }
    }

    pub fn inline() -> Self {
        Self {
            pool: None,
            worker_limit: 1,
        }
    }

    /// Threads actually available; 1 when running inline.
    pub fn worker_limit(&self) -> usize {
        self.worker_limit
    }

    /// Map `f` over `items`, preserving input order.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match &self.pool {
            Some(pool) if items.len() > 1 => {
                pool.install(|| items.par_iter().map(|item| f(item)).collect())
            }
            _ => items.iter().map(f).collect(),
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::inline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_input_order() {
        let pool = WorkerPool::new(4);
        let items: Vec<u64> = (0..200).collect();
        let out = pool.map(&items, |x| x * 2);
        assert_eq!(out, items.iter().map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn inline_and_parallel_agree() {
        let items: Vec<f64> = (1..=50).map(|x| x as f64).collect();
        let inline = WorkerPool::new(1).map(&items, |x| x.sqrt());
        let pooled = WorkerPool::new(8).map(&items, |x| x.sqrt());
        assert_eq!(inline, pooled);
    }

    #[test]
    fn pool_is_reused_across_calls() {
        let pool = WorkerPool::new(3);
        assert_eq!(pool.worker_limit(), 3);
        for round in 0..10u64 {
            let items: Vec<u64> = (0..32).collect();
            let out = pool.map(&items, |x| x + round);
            assert_eq!(out[31], 31 + round);
        }
    }

    #[test]
    fn zero_limit_runs_inline() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.worker_limit(), 1);
        assert_eq!(pool.map(&[1, 2, 3], |x| x * 10), vec![10, 20, 30]);
    }

    #[test]
    fn empty_input() {
        let out: Vec<i32> = WorkerPool::new(4).map(&[] as &[i32], |x| *x);
        assert!(out.is_empty());
    }
}
