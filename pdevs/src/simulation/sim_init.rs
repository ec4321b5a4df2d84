use std::error::Error;
use std::fmt;

use tracing::debug;

use crate::bench::{Bench, ModelError};

use super::{Coordinator, ExecutionError, FanOut, Parallel, Sequential, Simulation};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    Sequential,
    Parallel { num_threads: usize },
}

/// Builder for a simulation of a [`Bench`].
///
/// By default, the simulation is sequential and the bench is not flattened.
///
/// # Examples
///
/// ```
/// use pdevs::bench::Bench;
/// use pdevs::simulation::SimInit;
///
/// let bench = Bench::new("empty");
/// let mut simu = SimInit::new(bench).flatten(true).parallel().init(0.0)?;
///
/// assert_eq!(simu.simulate(10)?, 0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SimInit {
    bench: Bench,
    flatten: bool,
    mode: Mode,
}

impl SimInit {
    /// Creates a builder for a sequential simulation of the bench.
    pub fn new(bench: Bench) -> Self {
        Self {
            bench,
            flatten: false,
            mode: Mode::Sequential,
        }
    }

    /// Flattens the bench before building the executor tree.
    ///
    /// Parallel simulations are always flattened.
    pub fn flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;

        self
    }

    /// Runs the children of the root in insertion order on the calling
    /// thread.
    pub fn sequential(mut self) -> Self {
        self.mode = Mode::Sequential;

        self
    }

    /// Runs the children of the root on all available logical threads.
    pub fn parallel(self) -> Self {
        self.with_num_threads(num_cpus::get())
    }

    /// Runs the children of the root on the specified number of threads.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.mode = Mode::Parallel {
            num_threads: num_threads.max(1),
        };

        self
    }

    /// Builds the executor tree and initializes every model at `start_time`.
    pub fn init(mut self, start_time: f64) -> Result<Simulation<Coordinator>, InitError> {
        let flatten = self.flatten || matches!(self.mode, Mode::Parallel { .. });
        if flatten {
            self.bench.flatten()?;
        }
        debug!(
            mode = ?self.mode,
            flatten,
            atomics = self.bench.count_atomics(),
            "building simulation"
        );

        let fan_out: Box<dyn FanOut> = match self.mode {
            Mode::Sequential => Box::new(Sequential),
            Mode::Parallel { num_threads } => Box::new(Parallel::new(num_threads)),
        };
        let root = Coordinator::build(self.bench, fan_out)?;

        Ok(Simulation::new(root, start_time)?)
    }
}

impl fmt::Debug for SimInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimInit")
            .field("flatten", &self.flatten)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// An error returned when a simulation cannot be initialized.
#[derive(Debug)]
pub enum InitError {
    /// The bench could not be flattened or turned into executors.
    Model(ModelError),
    /// A model failed during initialization.
    Execution(ExecutionError),
}

impl fmt::Display for InitError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(e) => write!(fmt, "invalid bench: {}", e),
            Self::Execution(e) => write!(fmt, "initialization failed: {}", e),
        }
    }
}

impl Error for InitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(e) => Some(e),
            Self::Execution(e) => Some(e),
        }
    }
}

impl From<ModelError> for InitError {
    fn from(e: ModelError) -> Self {
        Self::Model(e)
    }
}

impl From<ExecutionError> for InitError {
    fn from(e: ExecutionError) -> Self {
        Self::Execution(e)
    }
}
