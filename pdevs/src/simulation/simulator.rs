use std::fmt;

use tracing::trace;

use crate::model::{Atomic, Context, DynAtomic};
use crate::ports::PortSet;

use super::{ExecutionError, Executor};

/// The executor of a single atomic model.
///
/// A `Simulator` is usually created by a [`SimInit`](super::SimInit) for
/// every atomic model of a bench, but it can also be used on its own to run
/// one model, or by a [`NodeServer`](crate::distributed::NodeServer) to host
/// a model on a remote node.
pub struct Simulator {
    name: String,
    model: Box<dyn DynAtomic>,
    pub(crate) ports: PortSet,
    tl: f64,
    tn: f64,
}

impl Simulator {
    /// Creates a simulator for the model built by `build`.
    pub fn new<M, F>(name: impl Into<String>, build: F) -> Self
    where
        M: Atomic,
        F: FnOnce(&mut PortSet) -> M,
    {
        let mut ports = PortSet::new();
        let model = build(&mut ports);

        Self::from_parts(name.into(), Box::new(model), ports)
    }

    pub(crate) fn from_parts(name: String, model: Box<dyn DynAtomic>, ports: PortSet) -> Self {
        Self {
            name,
            model,
            ports,
            tl: 0.0,
            tn: f64::INFINITY,
        }
    }

    /// Returns the (qualified) name of the model.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn ports_mut(&mut self) -> &mut PortSet {
        &mut self.ports
    }
}

impl Executor for Simulator {
    fn initialize(&mut self, time: f64) -> Result<(), ExecutionError> {
        self.model.initialize();
        self.tl = time;
        self.tn = time + self.model.time_advance();

        Ok(())
    }

    fn exit(&mut self) -> Result<(), ExecutionError> {
        self.model.exit();

        Ok(())
    }

    fn time_last(&self) -> f64 {
        self.tl
    }

    fn time_next(&self) -> f64 {
        self.tn
    }

    fn lambda(&mut self, time: f64) -> Result<(), ExecutionError> {
        if time == self.tn {
            let mut ctx = Context::new(time, &self.name, &mut self.ports);
            self.model.lambda(&mut ctx);
        }

        Ok(())
    }

    fn delta(&mut self, time: f64) -> Result<(), ExecutionError> {
        let has_input = !self.ports.is_input_empty();
        let imminent = time == self.tn;
        let elapsed = time - self.tl;
        let mut ctx = Context::new(time, &self.name, &mut self.ports);

        match (has_input, imminent) {
            (false, false) => return Ok(()),
            (false, true) => self.model.delta_int(&mut ctx),
            (true, true) => {
                self.model.decrement_sigma(elapsed);
                self.model.delta_con(elapsed, &mut ctx);
            }
            (true, false) => {
                self.model.decrement_sigma(elapsed);
                self.model.delta_ext(elapsed, &mut ctx);
            }
        }
        self.tl = time;
        self.tn = time + self.model.time_advance();
        trace!(
            model = self.name.as_str(),
            time,
            state = self.model.show_state().as_str(),
            "transition"
        );

        Ok(())
    }

    fn clear(&mut self) -> Result<(), ExecutionError> {
        self.ports.clear();

        Ok(())
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("name", &self.name)
            .field("tl", &self.tl)
            .field("tn", &self.tn)
            .finish_non_exhaustive()
    }
}
