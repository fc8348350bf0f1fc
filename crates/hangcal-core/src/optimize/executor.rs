//! Serial or parallel execution of independent jobs
//!
//! With the `parallel` feature the parallel executor maps jobs on the rayon
//! thread pool; without it, it falls back to serial iteration.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Where independent jobs run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Executor {
    /// One job after another on the calling thread
    Serial,
    /// Jobs spread over the worker pool
    #[default]
    Parallel,
}

impl Executor {
    /// Apply `f` to every item, results in item order
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        match self {
            Executor::Serial => items.into_iter().map(f).collect(),
            Executor::Parallel => map_parallel(items, f),
        }
    }

    /// True if jobs actually run concurrently
    pub fn is_parallel(&self) -> bool {
        cfg!(feature = "parallel") && *self == Executor::Parallel
    }
}

#[cfg(feature = "parallel")]
fn map_parallel<T, R, F>(items: Vec<T>, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync + Send,
{
    items.into_par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
fn map_parallel<T, R, F>(items: Vec<T>, f: F) -> Vec<R>
where
    F: Fn(T) -> R,
{
    items.into_iter().map(f).collect()
}
