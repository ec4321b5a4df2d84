//! Simulation management.
//!
//! This module contains most notably the [`Simulation`] driver, the
//! [`SimInit`] builder, and the executors of the simulation tree.
//!
//! # Simulation lifecycle
//!
//! 1. assembly of a [`Bench`](crate::bench::Bench) from atomic models, coupled
//!    components and couplings,
//! 2. optional connection of event sinks to the output ports of the root,
//! 3. creation of a [`SimInit`] builder, selection of the execution strategy
//!    (sequential or parallel) and of flattening,
//! 4. initialization of a [`Simulation`] with [`SimInit::init()`],
//! 5. execution with [`Simulation::step()`], [`Simulation::simulate()`] or
//!    [`Simulation::simulate_for()`], interleaved with external inputs
//!    injected with [`Simulation::inject()`],
//! 6. teardown with [`Simulation::exit()`].
//!
//! # Executors
//!
//! The simulation tree mirrors the component tree: each atomic model is driven
//! by a [`Simulator`] and each coupled component by a [`Coordinator`]. Both
//! implement the [`Executor`] trait, which is also implemented by the
//! [`DistributedCoordinator`](crate::distributed::DistributedCoordinator) and
//! can be used to drive a [`Simulation`].
//!
//! # Errors
//!
//! A model that panics does not bring the whole process down: the panic is
//! caught and reported as [`ExecutionError::Panic`]. After any execution
//! error, the simulation is considered broken and all further calls return
//! [`ExecutionError::Terminated`].
mod coordinator;
mod executor;
mod fan_out;
mod sim_init;
mod simulator;

pub use coordinator::Coordinator;
pub use executor::Executor;
pub use sim_init::{InitError, SimInit};
pub use simulator::Simulator;

pub(crate) use executor::Node;
pub(crate) use fan_out::{FanOut, Parallel, Sequential};

use std::any::{self, Any};
use std::error::Error;
use std::fmt;
use std::io;

use tracing::{debug, trace, warn};

use crate::distributed::WireError;
use crate::ports::{Direction, Port, Value};
use crate::time::Clock;

/// A simulation driven by a root executor.
///
/// The `Simulation` owns the simulation [`Clock`] and is the only place where
/// it is advanced. The root executor is usually a [`Coordinator`] created by
/// [`SimInit`], but any [`Executor`] can be used.
pub struct Simulation<E: Executor = Coordinator> {
    root: E,
    clock: Clock,
    halted: bool,
}

impl<E: Executor> Simulation<E> {
    /// Initializes the root executor at `start_time` and returns the
    /// simulation.
    pub fn new(mut root: E, start_time: f64) -> Result<Self, ExecutionError> {
        root.initialize(start_time)?;
        debug!(
            start_time,
            time_next = root.time_next(),
            "simulation initialized"
        );

        Ok(Self {
            root,
            clock: Clock::new(start_time),
            halted: false,
        })
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    /// Returns the time of the next scheduled event, or `f64::INFINITY`.
    pub fn time_next(&self) -> f64 {
        self.root.time_next()
    }

    /// Returns a copy of the simulation clock.
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Returns the root executor.
    pub fn executor(&self) -> &E {
        &self.root
    }

    /// Processes the next event.
    ///
    /// The clock is advanced to the time of the next event, then the root
    /// executor computes the outputs, runs the transitions and clears all
    /// ports. Returns the time of the processed event, or `None` if no event
    /// is scheduled.
    pub fn step(&mut self) -> Result<Option<f64>, ExecutionError> {
        if self.halted {
            return Err(ExecutionError::Terminated);
        }
        let time = self.root.time_next();
        if time == f64::INFINITY {
            return Ok(None);
        }

        self.clock.advance_to(time);
        trace!(time, "step");
        let result = self
            .root
            .lambda(time)
            .and_then(|_| self.root.delta(time))
            .and_then(|_| self.root.clear());
        self.check(result)?;

        Ok(Some(time))
    }

    /// Processes at most `max_steps` events and returns the number of events
    /// processed.
    ///
    /// Stops early when no further event is scheduled.
    pub fn simulate(&mut self, max_steps: u64) -> Result<u64, ExecutionError> {
        debug!(time = self.time(), max_steps, "simulation run started");
        let mut steps = 0;
        let result = loop {
            if steps == max_steps {
                break Ok(steps);
            }
            match self.step() {
                Ok(Some(_)) => steps += 1,
                Ok(None) => break Ok(steps),
                Err(e) => break Err(e),
            }
        };
        self.root.finish_run();
        debug!(time = self.time(), steps, "simulation run completed");

        result
    }

    /// Processes every event scheduled no later than `duration` after the
    /// current time and returns the number of events processed.
    ///
    /// The clock is left at the time of the last processed event. An infinite
    /// duration processes every scheduled event.
    pub fn simulate_for(&mut self, duration: f64) -> Result<u64, ExecutionError> {
        if !(duration >= 0.0) {
            return Err(ExecutionError::InvalidDuration(duration));
        }
        let deadline = self.time() + duration;
        debug!(time = self.time(), deadline, "simulation run started");
        let mut steps = 0;
        let result = loop {
            if self.halted {
                break Err(ExecutionError::Terminated);
            }
            if self.root.time_next() > deadline {
                break Ok(steps);
            }
            match self.step() {
                Ok(Some(_)) => steps += 1,
                Ok(None) => break Ok(steps),
                Err(e) => break Err(e),
            }
        };
        self.root.finish_run();
        debug!(time = self.time(), steps, "simulation run completed");

        result
    }

    /// Calls the teardown hook of every model and releases the executors.
    pub fn exit(mut self) -> Result<(), ExecutionError> {
        debug!(time = self.time(), "simulation exit");
        let result = self.root.exit();
        self.root.finish_run();

        result
    }

    fn check<T>(&mut self, result: Result<T, ExecutionError>) -> Result<T, ExecutionError> {
        if result.is_err() {
            self.halted = true;
        }

        result
    }
}

impl Simulation<Coordinator> {
    /// Injects a value on an input port of the root component.
    ///
    /// See [`inject_all()`](Self::inject_all).
    pub fn inject<T: Value>(
        &mut self,
        elapsed: f64,
        port: &str,
        value: T,
    ) -> Result<(), InjectError> {
        self.inject_all(elapsed, port, [value])
    }

    /// Injects values on an input port of the root component, `elapsed` time
    /// units after the current time.
    ///
    /// The injection must not skip a scheduled event: `elapsed` may be at
    /// most [`time_next()`](Self::time_next) minus the current time. On
    /// success, the clock is advanced by `elapsed` and the transitions of the
    /// models receiving the values are run; no output is computed. A rejected
    /// injection leaves the simulation untouched.
    pub fn inject_all<T, I>(
        &mut self,
        elapsed: f64,
        port: &str,
        values: I,
    ) -> Result<(), InjectError>
    where
        T: Value,
        I: IntoIterator<Item = T>,
    {
        if self.halted {
            return Err(InjectError::Execution(ExecutionError::Terminated));
        }
        if !(elapsed >= 0.0 && elapsed.is_finite()) {
            return Err(InjectError::InvalidElapsed(elapsed));
        }
        let now = self.clock.time();
        let time = now + elapsed;
        let time_next = self.root.time_next();
        if time > time_next {
            warn!(port, elapsed, time_next, "injection rejected");
            return Err(InjectError::OutOfBounds {
                elapsed,
                max: time_next - now,
            });
        }

        let index = self
            .root
            .ports
            .find(Direction::Input, port)
            .ok_or_else(|| InjectError::UnknownPort(port.to_string()))?;
        let target = &mut self.root.ports.inputs[index];
        let expected = target.value_type_name();
        let target = target
            .as_any_mut()
            .downcast_mut::<Port<T>>()
            .ok_or_else(|| InjectError::TypeMismatch {
                port: port.to_string(),
                expected,
                found: any::type_name::<T>(),
            })?;
        target.extend(values);

        self.clock.advance_to(time);
        trace!(time, port, "injection");
        let result = self.root.delta(time).and_then(|_| self.root.clear());

        self.check(result).map_err(InjectError::Execution)
    }
}

impl<E: Executor + fmt::Debug> fmt::Debug for Simulation<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("root", &self.root)
            .field("time", &self.clock.time())
            .field("halted", &self.halted)
            .finish()
    }
}

/// An error returned when a simulation step cannot complete.
#[derive(Debug)]
pub enum ExecutionError {
    /// A model panicked.
    Panic {
        /// Qualified name of the model.
        model: String,
        /// Payload of the panic.
        payload: Box<dyn Any + Send + 'static>,
    },
    /// A remote node could not be reached or sent an unreadable frame.
    Remote {
        /// Name of the node.
        node: String,
        /// Underlying error.
        source: WireError,
    },
    /// A remote node reported an error.
    Rejected {
        /// Name of the node.
        node: String,
        /// Message sent by the node.
        message: String,
    },
    /// A remote node sent a well-formed but meaningless response.
    Protocol {
        /// Name of the node.
        node: String,
        /// Description of the violation.
        message: String,
    },
    /// A worker thread could not be spawned.
    Spawn(io::Error),
    /// The duration of a run is negative or not a number.
    InvalidDuration(f64),
    /// The simulation was stopped by an earlier error.
    Terminated,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panic { model, payload } => {
                let message = payload
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| payload.downcast_ref::<String>().map(|s| s.as_str()));
                match message {
                    Some(message) => write!(fmt, "model '{}' panicked: {}", model, message),
                    None => write!(fmt, "model '{}' panicked", model),
                }
            }
            Self::Remote { node, source } => {
                write!(fmt, "communication with node '{}' failed: {}", node, source)
            }
            Self::Rejected { node, message } => {
                write!(fmt, "node '{}' reported an error: {}", node, message)
            }
            Self::Protocol { node, message } => {
                write!(fmt, "unexpected response from node '{}': {}", node, message)
            }
            Self::Spawn(e) => write!(fmt, "worker thread could not be spawned: {}", e),
            Self::InvalidDuration(duration) => {
                write!(fmt, "run duration {} is not a non-negative number", duration)
            }
            Self::Terminated => write!(fmt, "the simulation was terminated by an earlier error"),
        }
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Remote { source, .. } => Some(source),
            Self::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

/// An error returned when values cannot be injected.
#[derive(Debug)]
pub enum InjectError {
    /// The root component has no input port with this name.
    UnknownPort(String),
    /// The port carries values of another type.
    TypeMismatch {
        /// Name of the port.
        port: String,
        /// Value type of the port.
        expected: &'static str,
        /// Type of the injected values.
        found: &'static str,
    },
    /// The injection time lies beyond the next scheduled event.
    OutOfBounds {
        /// Requested elapsed time.
        elapsed: f64,
        /// Largest admissible elapsed time.
        max: f64,
    },
    /// The elapsed time is negative, infinite or not a number.
    InvalidElapsed(f64),
    /// The transitions triggered by the injection failed.
    Execution(ExecutionError),
}

impl fmt::Display for InjectError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPort(port) => write!(fmt, "the root has no input port named '{}'", port),
            Self::TypeMismatch {
                port,
                expected,
                found,
            } => write!(
                fmt,
                "port '{}' carries values of type {}, not {}",
                port, expected, found
            ),
            Self::OutOfBounds { elapsed, max } => write!(
                fmt,
                "elapsed time {} goes past the next scheduled event (at most {})",
                elapsed, max
            ),
            Self::InvalidElapsed(elapsed) => {
                write!(fmt, "elapsed time {} is not a finite non-negative number", elapsed)
            }
            Self::Execution(e) => write!(fmt, "{}", e),
        }
    }
}

impl Error for InjectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Execution(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ExecutionError> for InjectError {
    fn from(e: ExecutionError) -> Self {
        Self::Execution(e)
    }
}
