// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Data-parallel execution over a fixed-size worker pool.
//!
//! Every method returns only after all work it started has finished, so a call is
//! also a barrier: nothing scheduled by the next call can observe a half-updated
//! slice.

use crate::errors::{OkvsError, OkvsResult};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone)]
pub struct ParallelScheduler {
    thread_pool: Arc<ThreadPool>,
    threads: usize,
}

impl ParallelScheduler {
    pub fn new(threads: usize) -> OkvsResult<Self> {
        if threads == 0 {
            return Err(OkvsError::Scheduler {
                message: "worker pool needs at least one thread".to_string(),
            });
        }
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("okvs-worker-{i}"))
            .build()
            .map_err(|e| OkvsError::Scheduler {
                message: e.to_string(),
            })?;

        Ok(Self {
            thread_pool: Arc::new(thread_pool),
            threads,
        })
    }

    /// Subtract the given amount from the total number of available threads and return the result
    pub fn max_threads_minus(amount: usize) -> usize {
        let total_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        std::cmp::max(1, total_threads.saturating_sub(amount))
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Apply `op` to every item, results in input order.
    pub fn map<T, U, OP>(&self, items: &[T], op: OP) -> Vec<U>
    where
        T: Sync,
        U: Send,
        OP: Fn(&T) -> U + Sync + Send,
    {
        self.thread_pool
            .install(|| items.par_iter().map(|item| op(item)).collect())
    }

    /// Split `items` into contiguous blocks of `block` items, process each block on
    /// one worker and join the results back in input order.
    pub fn map_blocks<T, U, OP>(&self, items: &[T], block: usize, op: OP) -> Vec<U>
    where
        T: Sync,
        U: Send,
        OP: Fn(&T) -> U + Sync + Send,
    {
        let block = block.max(1);
        let per_block: Vec<Vec<U>> = self.thread_pool.install(|| {
            items
                .par_chunks(block)
                .map(|chunk| chunk.iter().map(&op).collect())
                .collect()
        });
        per_block.into_iter().flatten().collect()
    }

    /// Mutate every item in place, one contiguous block per task.
    ///
    /// Blocks are disjoint, so no two workers touch the same item.
    pub fn for_each_block<T, OP>(&self, items: &mut [T], block: usize, op: OP)
    where
        T: Send,
        OP: Fn(&mut T) + Sync + Send,
    {
        let block = block.max(1);
        self.thread_pool.install(|| {
            items
                .par_chunks_mut(block)
                .for_each(|chunk| chunk.iter_mut().for_each(&op))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_rejects_empty_pool() {
        assert!(ParallelScheduler::new(0).is_err());
        assert_eq!(ParallelScheduler::new(3).unwrap().threads(), 3);
    }

    #[test]
    fn test_map_blocks_preserves_order() {
        let scheduler = ParallelScheduler::new(4).unwrap();
        let items: Vec<u64> = (0..10_001).collect();
        let doubled = scheduler.map_blocks(&items, 64, |x| x * 2);
        assert_eq!(doubled, items.iter().map(|x| x * 2).collect::<Vec<_>>());
        assert_eq!(scheduler.map(&items, |x| x + 1)[10_000], 10_001);
    }

    #[test]
    fn test_for_each_block_completes_before_return() {
        let scheduler = ParallelScheduler::new(4).unwrap();
        let touched = AtomicUsize::new(0);
        let mut items = vec![1u32; 5000];
        scheduler.for_each_block(&mut items, 7, |x| {
            *x += 1;
            touched.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(touched.load(Ordering::Relaxed), 5000);
        assert!(items.iter().all(|&x| x == 2));
    }

    #[test]
    fn test_max_threads_minus_is_at_least_one() {
        assert!(ParallelScheduler::max_threads_minus(usize::MAX) >= 1);
    }
}
