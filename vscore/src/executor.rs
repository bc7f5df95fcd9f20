//! Ordered map executors.
//!
//! A map broadcasts one read-only payload to every worker, applies a pure
//! function to each input and returns the results in input order. The
//! parallel executor runs on a dedicated rayon pool; the sequential one runs on
//! the calling thread and doubles as the fallback when the pool fails.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use log::{info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;

/// Apply a pure function over an ordered collection, returning same-order results.
pub trait MapExecutor {
    fn name(&self) -> &'static str;

    fn map_broadcast<P, T, R, F>(
        &self,
        payload: &P,
        items: &[T],
        f: F,
    ) -> Result<Vec<R>, ExecutorError>
    where
        P: Sync,
        T: Sync,
        R: Send,
        F: Fn(&P, &T) -> R + Sync;
}

/// In-process, single-threaded executor.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialExecutor;

impl SequentialExecutor {
    pub fn apply<P, T, R, F>(&self, payload: &P, items: &[T], f: F) -> Vec<R>
    where
        F: Fn(&P, &T) -> R,
    {
        items.iter().map(|item| f(payload, item)).collect()
    }
}

impl MapExecutor for SequentialExecutor {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn map_broadcast<P, T, R, F>(
        &self,
        payload: &P,
        items: &[T],
        f: F,
    ) -> Result<Vec<R>, ExecutorError>
    where
        P: Sync,
        T: Sync,
        R: Send,
        F: Fn(&P, &T) -> R + Sync,
    {
        Ok(self.apply(payload, items, f))
    }
}

/// Executor backed by a dedicated rayon thread pool.
pub struct ParallelExecutor {
    pool: ThreadPool,
}

impl ParallelExecutor {
    /// Build a pool with `num_threads` workers, 0 meaning one per logical core.
    pub fn new(num_threads: usize) -> Result<Self, ExecutorError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("vscore-worker-{}", i))
            .build()?;
        Ok(ParallelExecutor { pool })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(s) = cause.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl MapExecutor for ParallelExecutor {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn map_broadcast<P, T, R, F>(
        &self,
        payload: &P,
        items: &[T],
        f: F,
    ) -> Result<Vec<R>, ExecutorError>
    where
        P: Sync,
        T: Sync,
        R: Send,
        F: Fn(&P, &T) -> R + Sync,
    {
        // rayon re-raises a worker panic on the installing thread
        let results = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool.install(|| {
                items
                    .par_iter()
                    .map(|item| f(payload, item))
                    .collect::<Vec<R>>()
            })
        }))
        .map_err(|cause| ExecutorError::WorkerPanicked(panic_message(cause.as_ref())))?;

        if results.len() != items.len() {
            return Err(ExecutorError::LostResults {
                expected: items.len(),
                found: results.len(),
            });
        }
        Ok(results)
    }
}

/// Which path produced a map's results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionPath {
    Parallel,
    Sequential,
    /// The parallel map failed and the input was re-run sequentially.
    SequentialFallback,
}

/// Executor handle selected once per run and passed to every stage that maps.
pub enum Executor {
    Parallel(ParallelExecutor),
    Sequential(SequentialExecutor),
    /// A parallel run was requested but no pool could be built.
    Degraded(SequentialExecutor),
}

impl Executor {
    /// Use a thread pool when `parallel` is set and one can be built, otherwise run sequentially.
    ///
    /// A pool that fails to build yields [`Executor::Degraded`], whose maps report
    /// [`ExecutionPath::SequentialFallback`].
    pub fn from_settings(parallel: bool, num_threads: usize) -> Self {
        if !parallel {
            return Executor::Sequential(SequentialExecutor);
        }
        Self::from_pool(ParallelExecutor::new(num_threads))
    }

    fn from_pool(pool: Result<ParallelExecutor, ExecutorError>) -> Self {
        match pool {
            Ok(pool) => {
                info!("parallel executor with {} threads", pool.num_threads());
                Executor::Parallel(pool)
            }
            Err(e) => {
                warn!("{}, running sequentially", e);
                Executor::Degraded(SequentialExecutor)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Executor::Parallel(p) => p.name(),
            Executor::Sequential(s) | Executor::Degraded(s) => s.name(),
        }
    }

    /// Map `f` over `items`, re-running the whole input sequentially if the parallel path fails.
    ///
    /// No partial parallel results are reused by the fallback.
    pub fn map_or_serial<P, T, R, F>(&self, payload: &P, items: &[T], f: F) -> (Vec<R>, ExecutionPath)
    where
        P: Sync,
        T: Sync,
        R: Send,
        F: Fn(&P, &T) -> R + Sync,
    {
        match self {
            Executor::Sequential(s) => (s.apply(payload, items, f), ExecutionPath::Sequential),
            Executor::Degraded(s) => (
                s.apply(payload, items, f),
                ExecutionPath::SequentialFallback,
            ),
            Executor::Parallel(p) => match p.map_broadcast(payload, items, &f) {
                Ok(results) => (results, ExecutionPath::Parallel),
                Err(e) => {
                    warn!("parallel map failed ({}), proceeding serially", e);
                    (
                        SequentialExecutor.apply(payload, items, f),
                        ExecutionPath::SequentialFallback,
                    )
                }
            },
        }
    }
}
