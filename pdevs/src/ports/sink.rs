pub(crate) mod event_buffer;
pub(crate) mod event_slot;

use std::marker::PhantomData;

use super::{AnyPort, Port, Value};

/// A simulation endpoint that receives the values leaving the root component.
///
/// An `EventSink` can be thought of as a self-standing input port meant to
/// externally monitor the simulated system. Each value is delivered together
/// with the simulation time at which it was emitted.
pub trait EventSink<T> {
    /// Writer handle to an event sink.
    type Writer: EventSinkWriter<T>;

    /// Returns the writer handle associated to this sink.
    fn writer(&self) -> Self::Writer;
}

/// A writer handle to an event sink.
pub trait EventSinkWriter<T>: Clone + Send + Sync + 'static {
    /// Writes a value to the associated sink.
    fn write(&self, event: T);
}

/// An iterator over collected events with the ability to pause and resume
/// event collection.
pub trait EventSinkStream: Iterator {
    /// Starts or resumes the collection of new events.
    fn open(&mut self);

    /// Pauses the collection of new events.
    ///
    /// Events that were previously collected remain available.
    fn close(&mut self);

    /// Returns `true` if new events are currently collected.
    fn is_open(&self) -> bool;
}

/// Type-erased forwarding of an output port to a sink writer.
pub(crate) trait SinkForward: Send {
    fn forward(&self, time: f64, port: &dyn AnyPort);
}

/// Forwards the values of a `Port<T>` as `(time, value)` pairs.
pub(crate) struct Forwarder<T, W> {
    writer: W,
    _phantom: PhantomData<fn(T)>,
}

impl<T, W> Forwarder<T, W> {
    pub(crate) fn new(writer: W) -> Self {
        Self {
            writer,
            _phantom: PhantomData,
        }
    }
}

impl<T: Value, W: EventSinkWriter<(f64, T)>> SinkForward for Forwarder<T, W> {
    fn forward(&self, time: f64, port: &dyn AnyPort) {
        if let Some(port) = port.as_any().downcast_ref::<Port<T>>() {
            for value in port.values() {
                self.writer.write((time, value.clone()));
            }
        }
    }
}
