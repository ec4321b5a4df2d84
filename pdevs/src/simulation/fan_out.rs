//! Strategies for running one phase over the children of a coordinator.
use std::mem;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::runtime::WorkerPool;

use super::{ExecutionError, Node};

/// A phase that can be fanned out over the children of a coordinator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Stage {
    Lambda,
    Delta,
}

/// Runs a phase over the children of a coordinator and waits for all of them.
pub(crate) trait FanOut: Send {
    fn run(&mut self, stage: Stage, children: &mut Vec<Node>, time: f64)
        -> Result<(), ExecutionError>;

    /// Releases the resources acquired during a simulation run.
    fn finish_run(&mut self) {}
}

/// Calls `f` on every node in order, converting panics into errors.
///
/// All nodes are visited even if one fails; the first error is returned.
pub(crate) fn run_guarded<'a, I, F>(nodes: I, mut f: F) -> Result<(), ExecutionError>
where
    I: IntoIterator<Item = &'a mut Node>,
    F: FnMut(&mut Node) -> Result<(), ExecutionError>,
{
    let mut outcome = Ok(());
    for node in nodes {
        let result = match panic::catch_unwind(AssertUnwindSafe(|| f(node))) {
            Ok(result) => result,
            Err(payload) => {
                error!(model = node.name(), "model panicked");
                Err(ExecutionError::Panic {
                    model: node.name().to_string(),
                    payload,
                })
            }
        };
        if outcome.is_ok() {
            outcome = result;
        }
    }

    outcome
}

fn run_stage<'a, I>(stage: Stage, nodes: I, time: f64) -> Result<(), ExecutionError>
where
    I: IntoIterator<Item = &'a mut Node>,
{
    run_guarded(nodes, |node| match stage {
        Stage::Lambda => node.executor().lambda(time),
        Stage::Delta => node.executor().delta(time),
    })
}

/// Runs the children one after the other, in insertion order.
#[derive(Debug, Default)]
pub(crate) struct Sequential;

impl FanOut for Sequential {
    fn run(
        &mut self,
        stage: Stage,
        children: &mut Vec<Node>,
        time: f64,
    ) -> Result<(), ExecutionError> {
        run_stage(stage, children.iter_mut(), time)
    }
}

/// Runs the children on a worker pool, in contiguous batches of similar size.
///
/// The pool is spawned on first use and released by `finish_run`.
#[derive(Debug)]
pub(crate) struct Parallel {
    num_threads: usize,
    pool: Option<WorkerPool>,
}

impl Parallel {
    pub(crate) fn new(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
            pool: None,
        }
    }
}

impl FanOut for Parallel {
    fn run(
        &mut self,
        stage: Stage,
        children: &mut Vec<Node>,
        time: f64,
    ) -> Result<(), ExecutionError> {
        if children.len() < 2 || self.num_threads < 2 {
            return run_stage(stage, children.iter_mut(), time);
        }
        let pool = match self.pool.take() {
            Some(pool) => pool,
            None => WorkerPool::new(self.num_threads).map_err(ExecutionError::Spawn)?,
        };

        let batch_size = children.len().div_ceil(self.num_threads);
        let mut nodes = mem::take(children).into_iter();
        let mut batches = Vec::new();
        loop {
            let batch: Vec<Node> = nodes.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            batches.push(move || {
                let mut batch = batch;
                let result = run_stage(stage, batch.iter_mut(), time);
                (batch, result)
            });
        }

        let mut outcome = Ok(());
        for result in pool.invoke_all(batches) {
            match result {
                Ok((batch, result)) => {
                    children.extend(batch);
                    if outcome.is_ok() {
                        outcome = result;
                    }
                }
                // Panics are caught per node, so this only happens if a panic
                // payload itself panicked on drop; the batch is lost.
                Err(payload) => {
                    if outcome.is_ok() {
                        outcome = Err(ExecutionError::Panic {
                            model: "<batch>".to_string(),
                            payload,
                        });
                    }
                }
            }
        }
        self.pool = Some(pool);

        outcome
    }

    fn finish_run(&mut self) {
        self.pool = None;
    }
}
