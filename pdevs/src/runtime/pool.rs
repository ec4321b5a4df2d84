use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads with scatter/gather batches.
///
/// Tasks are pulled from a shared queue by whichever worker is idle. Dropping
/// the pool closes the queue and joins every worker once the tasks already
/// queued have run.
pub struct WorkerPool {
    injector: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns a pool with `num_threads` workers (at least one).
    pub fn new(num_threads: usize) -> io::Result<Self> {
        let num_threads = num_threads.max(1);
        let (injector, queue) = crossbeam_channel::unbounded::<Task>();

        let workers = (0..num_threads)
            .map(|id| {
                let queue = queue.clone();
                thread::Builder::new()
                    .name(format!("Worker #{}", id))
                    .spawn(move || run_worker(queue))
            })
            .collect::<io::Result<Vec<_>>>()?;

        debug!(num_threads, "worker pool started");

        Ok(Self {
            injector: Some(injector),
            workers,
        })
    }

    /// Returns the number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    /// Runs all tasks and waits for their completion.
    ///
    /// Results are returned in the order of the tasks. A task that panicked
    /// yields the panic payload instead of its result, and does not prevent
    /// the other tasks from completing.
    pub fn invoke_all<T, F>(&self, tasks: Vec<F>) -> Vec<thread::Result<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let count = tasks.len();
        let (reply, results) = crossbeam_channel::bounded(count);

        for (index, task) in tasks.into_iter().enumerate() {
            let reply = reply.clone();
            let job: Task = Box::new(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(task));
                let _ = reply.send((index, result));
            });

            let rejected = match &self.injector {
                Some(injector) => injector.send(job).err().map(|e| e.into_inner()),
                None => Some(job),
            };
            // With no worker left to pick it up, the task runs on the caller
            // thread.
            if let Some(job) = rejected {
                job();
            }
        }
        drop(reply);

        gather(count, results)
    }
}

fn run_worker(queue: Receiver<Task>) {
    while let Ok(task) = queue.recv() {
        task();
    }
}

fn gather<T>(
    count: usize,
    results: Receiver<(usize, thread::Result<T>)>,
) -> Vec<thread::Result<T>> {
    let mut slots: Vec<Option<thread::Result<T>>> = (0..count).map(|_| None).collect();
    for (index, result) in results.iter() {
        slots[index] = Some(result);
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| Err(Box::new("task was dropped") as Box<dyn Any + Send>))
        })
        .collect()
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.injector = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("worker pool stopped");
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.workers.len())
            .finish_non_exhaustive()
    }
}
