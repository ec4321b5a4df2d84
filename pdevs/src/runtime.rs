//! Worker threads.
//!
//! The parallel and distributed coordinators spread the work of each
//! simulation phase over a [`WorkerPool`], then wait for the whole batch to
//! complete before propagating values along couplings.
mod pool;

pub use pool::WorkerPool;
