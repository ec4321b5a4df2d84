//! Ports, port handles and event sinks.
//!
//! # Ports
//!
//! A port is a named, typed buffer owned by a single component. Values written
//! to a port during a simulation step remain buffered until the end of that
//! step, at which point every port of every component is cleared.
//!
//! Atomic models declare their ports when they are added to a
//! [`Bench`](crate::bench::Bench), using the [`PortSet`] handed over to the
//! model constructor. Each declaration returns a typed handle ([`InPort`] or
//! [`OutPort`]) which the model keeps and later uses to read its inputs or
//! write its outputs through a [`Context`](crate::model::Context):
//!
//! ```
//! use pdevs::model::{Atomic, BasicPhase, Context, State};
//! use pdevs::ports::{InPort, OutPort, PortSet};
//!
//! pub struct Doubler {
//!     state: State<BasicPhase>,
//!     input: InPort<f64>,
//!     output: OutPort<f64>,
//!     last: f64,
//! }
//! impl Doubler {
//!     pub fn new(ports: &mut PortSet) -> Self {
//!         Self {
//!             state: State::default(),
//!             input: ports.add_input("in"),
//!             output: ports.add_output("out"),
//!             last: 0.0,
//!         }
//!     }
//! }
//! impl Atomic for Doubler {
//!     type Phase = BasicPhase;
//!
//!     fn state(&self) -> &State<BasicPhase> {
//!         &self.state
//!     }
//!     fn state_mut(&mut self) -> &mut State<BasicPhase> {
//!         &mut self.state
//!     }
//!     fn delta_int(&mut self, _: &mut Context<'_>) {
//!         self.state.passivate();
//!     }
//!     fn delta_ext(&mut self, _: f64, ctx: &mut Context<'_>) {
//!         if let Some(value) = ctx.single_value(&self.input) {
//!             self.last = 2.0 * value;
//!             self.state.activate();
//!         }
//!     }
//!     fn lambda(&self, ctx: &mut Context<'_>) {
//!         ctx.send(&self.output, self.last);
//!     }
//! }
//! ```
//!
//! Ports of coupled components are declared directly on the bench and are
//! referred to by name or by [`PortId`].
//!
//! # Event sinks
//!
//! The output ports of the root component can be connected to an
//! [`EventSink`] such as an [`EventBuffer`] or an [`EventSlot`] in order to
//! observe the values leaving the simulated system together with the
//! simulation time at which they were produced.
mod port;
mod sink;

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bench::ComponentId;

pub(crate) use port::{AnyPort, Port};
pub use port::PortSet;
pub(crate) use sink::{Forwarder, SinkForward};
pub use sink::{
    event_buffer::{EventBuffer, EventBufferWriter},
    event_slot::{EventSlot, EventSlotWriter},
    EventSink, EventSinkStream, EventSinkWriter,
};

/// A type that can be carried by a port.
///
/// Values are copied when they travel along a coupling, and must be
/// serializable so they can be exchanged between the nodes of a distributed
/// simulation. This trait is automatically implemented for all eligible types.
pub trait Value: Clone + Send + Serialize + DeserializeOwned + 'static {}

impl<T> Value for T where T: Clone + Send + Serialize + DeserializeOwned + 'static {}

/// The direction of a port relative to its owning component.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// An input port.
    Input,
    /// An output port.
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Bench-wide identifier of a port.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortId {
    pub(crate) component: ComponentId,
    pub(crate) direction: Direction,
    pub(crate) index: usize,
}

impl PortId {
    /// Returns the identifier of the component owning the port.
    pub fn component(&self) -> ComponentId {
        self.component
    }

    /// Returns the direction of the port.
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// A typed handle to an input port of an atomic model.
///
/// The handle is only meaningful for the model that declared it.
pub struct InPort<T> {
    pub(crate) index: usize,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> InPort<T> {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            _phantom: PhantomData,
        }
    }
}

impl<T> Clone for InPort<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for InPort<T> {}

impl<T> fmt::Debug for InPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InPort({})", self.index)
    }
}

/// A typed handle to an output port of an atomic model.
///
/// The handle is only meaningful for the model that declared it.
pub struct OutPort<T> {
    pub(crate) index: usize,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> OutPort<T> {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            _phantom: PhantomData,
        }
    }
}

impl<T> Clone for OutPort<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for OutPort<T> {}

impl<T> fmt::Debug for OutPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutPort({})", self.index)
    }
}
