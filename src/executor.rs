//! Data parallel execution over row tiles.
//!
//! A dispatch splits the rows of a dataset into contiguous tiles and runs one
//! task per tile, each on its own worker thread. Tasks see their tile's row
//! range plus whatever read-only inputs the closure captures, and may combine
//! partial results with the other workers through a collective sum. The
//! results of every tile are returned in rank order.
use crate::errors::BoostError;
use log::debug;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::Range;
use std::sync::{Barrier, Mutex, PoisonError};

/// Tiles are never made smaller than this, so tiny datasets are not
/// spread over more workers than they can keep busy.
pub const MIN_ROWS_PER_WORKER: usize = 10;

/// A split of `n_rows` into `n_tiles` contiguous tiles of `rows_per_tile`
/// rows, the last tiles possibly being shorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tiling {
    pub n_rows: usize,
    pub n_tiles: usize,
    pub rows_per_tile: usize,
}

impl Tiling {
    pub fn new(n_rows: usize, available_workers: usize) -> Self {
        let n_tiles = available_workers
            .min(n_rows.div_ceil(MIN_ROWS_PER_WORKER))
            .max(1);
        let rows_per_tile = n_rows.div_ceil(n_tiles);
        Tiling {
            n_rows,
            n_tiles,
            rows_per_tile,
        }
    }

    /// The rows owned by a given tile.
    pub fn range(&self, rank: usize) -> Range<usize> {
        let start = (rank * self.rows_per_tile).min(self.n_rows);
        let end = (start + self.rows_per_tile).min(self.n_rows);
        start..end
    }
}

/// Sum all-reduce between the workers of one dispatch.
///
/// Every worker publishes its buffer, waits for the others, and then sums
/// all of the published buffers in rank order, so every worker ends up with
/// the same result.
pub struct Communicator {
    size: usize,
    slots: Vec<Mutex<Vec<f64>>>,
    barrier: Barrier,
}

impl Communicator {
    pub fn new(size: usize) -> Self {
        Communicator {
            size,
            slots: (0..size).map(|_| Mutex::new(Vec::new())).collect(),
            barrier: Barrier::new(size),
        }
    }

    /// Replace `buf` with the element wise sum of `buf` over all workers.
    /// Every worker must call this the same number of times with buffers
    /// of the same length. A length mismatch panics on every worker once
    /// all of them have left the collective. A task that panics outside a
    /// collective while the others wait inside one deadlocks the dispatch.
    pub fn all_reduce_sum(&self, rank: usize, buf: &mut [f64]) {
        if self.size == 1 {
            return;
        }
        {
            let mut slot = self.slots[rank]
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            slot.clear();
            slot.extend_from_slice(buf);
        }
        self.barrier.wait();
        buf.iter_mut().for_each(|v| *v = 0.0);
        let mut mismatch = false;
        for slot in self.slots.iter() {
            let slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
            mismatch |= slot.len() != buf.len();
            buf.iter_mut().zip(slot.iter()).for_each(|(a, b)| *a += *b);
        }
        // Nobody may publish again until everyone has read this round.
        self.barrier.wait();
        assert!(
            !mismatch,
            "All-reduce buffers differ in length between workers."
        );
    }
}

/// The view a task has of its place in a dispatch.
pub struct Worker<'a> {
    pub rank: usize,
    pub tiling: Tiling,
    comm: &'a Communicator,
}

impl<'a> Worker<'a> {
    pub fn rows(&self) -> Range<usize> {
        self.tiling.range(self.rank)
    }

    /// Worker 0 holds the authoritative copy of anything built collectively.
    pub fn is_coordinator(&self) -> bool {
        self.rank == 0
    }

    pub fn all_reduce_sum(&self, buf: &mut [f64]) {
        self.comm.all_reduce_sum(self.rank, buf);
    }
}

/// A pool of workers that tasks are dispatched onto.
pub struct Executor {
    pool: ThreadPool,
    n_threads: usize,
}

impl Executor {
    /// Create an executor with `n_threads` workers, or as many as the
    /// global rayon pool has if `None`.
    pub fn new(n_threads: Option<usize>) -> Result<Self, BoostError> {
        let n_threads = n_threads.unwrap_or_else(rayon::current_num_threads).max(1);
        let pool = ThreadPoolBuilder::new().num_threads(n_threads).build()?;
        Ok(Executor { pool, n_threads })
    }

    pub fn available_workers(&self) -> usize {
        self.n_threads
    }

    pub fn tiling(&self, n_rows: usize) -> Tiling {
        Tiling::new(n_rows, self.n_threads)
    }

    /// Run `task` once for every tile of `n_rows`, returning the results
    /// in rank order. A single tile runs on the calling thread and never
    /// communicates.
    pub fn dispatch<R, F>(&self, n_rows: usize, task: F) -> Vec<R>
    where
        F: Fn(&Worker) -> R + Sync,
        R: Send,
    {
        let tiling = self.tiling(n_rows);
        let comm = Communicator::new(tiling.n_tiles);
        debug!(
            "Dispatching {} rows over {} worker(s), {} rows per tile.",
            n_rows, tiling.n_tiles, tiling.rows_per_tile
        );
        if tiling.n_tiles == 1 {
            let worker = Worker {
                rank: 0,
                tiling,
                comm: &comm,
            };
            return vec![task(&worker)];
        }
        self.pool
            .broadcast(|ctx| {
                let rank = ctx.index();
                if rank >= tiling.n_tiles {
                    return None;
                }
                let worker = Worker {
                    rank,
                    tiling,
                    comm: &comm,
                };
                Some(task(&worker))
            })
            .into_iter()
            .flatten()
            .collect()
    }

    /// Run `op` inside this executor's pool, so any rayon parallelism it
    /// uses is bounded by the executor's worker count.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}
