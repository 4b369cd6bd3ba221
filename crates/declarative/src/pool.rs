//! Worker pool for parallel passes
//!
//! Tasks are plain data: an object name plus the operation to perform.
//! Workers resolve the name through the store themselves and send one
//! [`Outcome`] per task back over a channel to the controlling thread.

use crate::error::{Error, Result};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Transfer a type's explorers to the target.
    TransferExplorers,
    /// Run explorers and the type manifest.
    Prepare,
    /// Generate and execute code.
    Run,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Object name, or type name for [`Operation::TransferExplorers`].
    pub name: String,
    pub operation: Operation,
}

impl Task {
    pub fn new(name: impl Into<String>, operation: Operation) -> Self {
        Self {
            name: name.into(),
            operation,
        }
    }
}

#[derive(Debug)]
pub struct Outcome {
    pub task: Task,
    pub result: Result<()>,
}

/// Thread pool with `jobs` workers.
pub fn build(jobs: usize) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|index| format!("cdist-worker-{index}"))
        .build()
        .map_err(|e| Error::io("thread pool", std::io::Error::other(e)))
}

/// Run every task on the pool and collect the outcomes.
///
/// Blocks until all tasks finished; a failing task does not stop its
/// siblings. Outcomes arrive in completion order.
pub fn dispatch<F>(pool: &ThreadPool, tasks: Vec<Task>, work: F) -> Vec<Outcome>
where
    F: Fn(&Task) -> Result<()> + Send + Sync,
{
    let (tx, rx) = mpsc::channel();
    pool.install(|| {
        tasks.into_par_iter().for_each_with(tx, |tx, task| {
            let result = work(&task);
            if let Err(e) = &result {
                log::debug!("{:?} {} failed: {e}", task.operation, task.name);
            }
            // receiver outlives the pool scope
            let _ = tx.send(Outcome { task, result });
        });
    });
    rx.into_iter().collect()
}
