//! Worker pool for the hierarchical passes
//!
//! With more than one thread the jobs of one phase run on a dedicated rayon
//! pool; otherwise they run in order on the calling thread. Results always
//! come back in job order.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

pub struct JobPool {
    pool: Option<ThreadPool>,
}

impl JobPool {
    pub fn new(threads: usize) -> Self {
        if threads <= 1 {
            return Self { pool: None };
        }
        match ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("hiergeo-worker-{}", i))
            .build()
        {
            Ok(pool) => Self { pool: Some(pool) },
            Err(e) => {
                log::warn!("[Jobs] Could not start {} worker threads, running sequentially: {}", threads, e);
                Self { pool: None }
            }
        }
    }

    pub fn sequential() -> Self {
        Self { pool: None }
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    pub fn threads(&self) -> usize {
        self.pool.as_ref().map_or(1, |p| p.current_num_threads())
    }

    /// Run `f` on every item
    pub fn map<I, R, F>(&self, items: Vec<I>, f: F) -> Vec<R>
    where
        I: Send,
        R: Send,
        F: Fn(I) -> R + Sync + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(|| items.into_par_iter().map(f).collect()),
            None => items.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_keeps_order() {
        let items: Vec<usize> = (0..100).collect();
        let seq = JobPool::sequential().map(items.clone(), |i| i * 2);
        let par = JobPool::new(4).map(items, |i| i * 2);
        assert_eq!(seq, par);
        assert_eq!(seq[10], 20);
    }

    #[test]
    fn test_single_thread_is_sequential() {
        assert!(!JobPool::new(0).is_parallel());
        assert!(!JobPool::new(1).is_parallel());
        assert_eq!(JobPool::new(1).threads(), 1);
    }
}
