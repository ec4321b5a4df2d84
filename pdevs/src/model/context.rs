use std::fmt;

use crate::ports::{InPort, OutPort, PortSet, Value};

/// Port access and simulation time during a transition.
///
/// A `Context` is handed to every transition and output function of an
/// [`Atomic`](super::Atomic) model. Input values can be read during the
/// external and confluent transitions; values written with
/// [`send()`](Self::send) are only propagated if written from
/// [`Atomic::lambda()`](super::Atomic::lambda).
///
/// # Panics
///
/// The port accessors panic if given a handle declared by another model.
///
/// # Examples
///
/// A model that emits the sum of the values received at each step.
///
/// ```
/// use pdevs::model::{Atomic, Context, State};
/// use pdevs::ports::{InPort, OutPort, PortSet};
///
/// pub struct Adder {
///     state: State,
///     input: InPort<u64>,
///     output: OutPort<u64>,
///     sum: u64,
/// }
/// impl Adder {
///     pub fn new(ports: &mut PortSet) -> Self {
///         Self {
///             state: State::default(),
///             input: ports.add_input("in"),
///             output: ports.add_output("sum"),
///             sum: 0,
///         }
///     }
/// }
/// impl Atomic for Adder {
///     type Phase = pdevs::model::BasicPhase;
///
///     fn state(&self) -> &State {
///         &self.state
///     }
///     fn state_mut(&mut self) -> &mut State {
///         &mut self.state
///     }
///     fn delta_int(&mut self, _: &mut Context<'_>) {
///         self.state.passivate();
///     }
///     fn delta_ext(&mut self, _: f64, ctx: &mut Context<'_>) {
///         self.sum = ctx.values(&self.input).iter().sum();
///         self.state.activate();
///     }
///     fn lambda(&self, ctx: &mut Context<'_>) {
///         ctx.send(&self.output, self.sum);
///     }
/// }
/// ```
pub struct Context<'a> {
    time: f64,
    name: &'a str,
    ports: &'a mut PortSet,
}

impl<'a> Context<'a> {
    pub(crate) fn new(time: f64, name: &'a str, ports: &'a mut PortSet) -> Self {
        Self { time, name, ports }
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Returns the name of the model.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns all values received on an input port during this step, in
    /// arrival order.
    pub fn values<T: Value>(&self, port: &InPort<T>) -> &[T] {
        self.ports.input(port).values()
    }

    /// Returns the first value received on an input port, if any.
    pub fn single_value<T: Value>(&self, port: &InPort<T>) -> Option<&T> {
        self.values(port).first()
    }

    /// Checks whether no value was received on any input port.
    pub fn is_input_empty(&self) -> bool {
        self.ports.is_input_empty()
    }

    /// Writes a value to an output port.
    pub fn send<T: Value>(&mut self, port: &OutPort<T>, value: T) {
        self.ports.output_mut(port).push(value);
    }

    /// Writes several values to an output port, preserving their order.
    pub fn send_all<T: Value, I: IntoIterator<Item = T>>(&mut self, port: &OutPort<T>, values: I) {
        self.ports.output_mut(port).extend(values);
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("time", &self.time)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
