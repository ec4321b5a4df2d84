//! Typed port buffers and their type-erased interface.
use std::any::{self, Any, TypeId};
use std::fmt;

use crate::distributed::WireError;

use super::{Direction, InPort, OutPort, Value};

/// A named, typed, append-only buffer of the values produced during the
/// current simulation step.
pub(crate) struct Port<T> {
    name: String,
    values: Vec<T>,
}

impl<T: Value> Port<T> {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub(crate) fn values(&self) -> &[T] {
        &self.values
    }

    pub(crate) fn push(&mut self, value: T) {
        self.values.push(value);
    }

    pub(crate) fn extend<I: IntoIterator<Item = T>>(&mut self, values: I) {
        self.values.extend(values);
    }
}

/// Object-safe interface over a `Port<T>` of any value type.
pub(crate) trait AnyPort: Send {
    fn name(&self) -> &str;

    /// Type identifier of the values carried by the port.
    fn value_type(&self) -> TypeId;

    fn value_type_name(&self) -> &'static str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Appends a copy of all buffered values to the destination port,
    /// preserving their order.
    ///
    /// # Panics
    ///
    /// Panics if the destination carries a different value type. Couplings
    /// are type-checked when created, so this is a logic error.
    fn copy_into(&self, dst: &mut dyn AnyPort);

    /// Serializes the buffered values as a CBOR array.
    fn encode_values(&self) -> Result<Vec<u8>, WireError>;

    /// Deserializes a CBOR array and appends its values to the buffer.
    fn decode_values(&mut self, bytes: &[u8]) -> Result<(), WireError>;
}

impl<T: Value> AnyPort for Port<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn value_type_name(&self) -> &'static str {
        any::type_name::<T>()
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn clear(&mut self) {
        self.values.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn copy_into(&self, dst: &mut dyn AnyPort) {
        if self.values.is_empty() {
            return;
        }
        let dst_name = dst.name().to_string();
        match dst.as_any_mut().downcast_mut::<Port<T>>() {
            Some(dst) => dst.values.extend(self.values.iter().cloned()),
            None => panic!(
                "port `{}` cannot receive values of type `{}` from port `{}`",
                dst_name,
                any::type_name::<T>(),
                self.name
            ),
        }
    }

    fn encode_values(&self) -> Result<Vec<u8>, WireError> {
        let mut buffer = Vec::new();
        ciborium::into_writer(&self.values, &mut buffer)
            .map_err(|e| WireError::Codec(e.to_string()))?;

        Ok(buffer)
    }

    fn decode_values(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        let values: Vec<T> =
            ciborium::from_reader(bytes).map_err(|e| WireError::Codec(e.to_string()))?;
        self.values.extend(values);

        Ok(())
    }
}

/// The input and output ports of a component.
///
/// A `PortSet` is handed to the constructor of an atomic model when the model
/// is added to a [`Bench`](crate::bench::Bench), and is the only way for a
/// model to declare its ports.
#[derive(Default)]
pub struct PortSet {
    pub(crate) inputs: Vec<Box<dyn AnyPort>>,
    pub(crate) outputs: Vec<Box<dyn AnyPort>>,
    duplicate: Option<String>,
}

impl PortSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Declares an input port and returns its handle.
    ///
    /// Port names must be unique among the input ports of a model; a
    /// duplicate name is reported as an error when the model is added to the
    /// bench.
    pub fn add_input<T: Value>(&mut self, name: impl Into<String>) -> InPort<T> {
        InPort::new(self.add::<T>(Direction::Input, name.into()))
    }

    /// Declares an output port and returns its handle.
    ///
    /// Port names must be unique among the output ports of a model; a
    /// duplicate name is reported as an error when the model is added to the
    /// bench.
    pub fn add_output<T: Value>(&mut self, name: impl Into<String>) -> OutPort<T> {
        OutPort::new(self.add::<T>(Direction::Output, name.into()))
    }

    pub(crate) fn add<T: Value>(&mut self, direction: Direction, name: String) -> usize {
        if self.find(direction, &name).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(name.clone());
        }
        let ports = self.list_mut(direction);
        ports.push(Box::new(Port::<T>::new(name)));

        ports.len() - 1
    }

    /// Returns the first duplicate port name, if any was declared.
    pub(crate) fn duplicate(&self) -> Option<&str> {
        self.duplicate.as_deref()
    }

    pub(crate) fn list(&self, direction: Direction) -> &[Box<dyn AnyPort>] {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    pub(crate) fn list_mut(&mut self, direction: Direction) -> &mut Vec<Box<dyn AnyPort>> {
        match direction {
            Direction::Input => &mut self.inputs,
            Direction::Output => &mut self.outputs,
        }
    }

    pub(crate) fn find(&self, direction: Direction, name: &str) -> Option<usize> {
        self.list(direction).iter().position(|p| p.name() == name)
    }

    pub(crate) fn get(&self, direction: Direction, index: usize) -> Option<&dyn AnyPort> {
        self.list(direction).get(index).map(|p| &**p)
    }

    pub(crate) fn is_input_empty(&self) -> bool {
        self.inputs.iter().all(|p| p.is_empty())
    }

    /// Clears every input and output port.
    pub(crate) fn clear(&mut self) {
        for port in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            port.clear();
        }
    }

    /// Returns the typed buffer behind an input handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle was declared by another model.
    pub(crate) fn input<T: Value>(&self, port: &InPort<T>) -> &Port<T> {
        self.inputs
            .get(port.index)
            .and_then(|p| p.as_any().downcast_ref::<Port<T>>())
            .unwrap_or_else(|| panic!("input handle {:?} does not belong to this model", port))
    }

    /// Returns the typed buffer behind an output handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle was declared by another model.
    pub(crate) fn output_mut<T: Value>(&mut self, port: &OutPort<T>) -> &mut Port<T> {
        self.outputs
            .get_mut(port.index)
            .and_then(|p| p.as_any_mut().downcast_mut::<Port<T>>())
            .unwrap_or_else(|| panic!("output handle {:?} does not belong to this model", port))
    }
}

impl fmt::Debug for PortSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |ports: &[Box<dyn AnyPort>]| {
            ports
                .iter()
                .map(|p| p.name().to_string())
                .collect::<Vec<_>>()
        };
        f.debug_struct("PortSet")
            .field("inputs", &names(&self.inputs))
            .field("outputs", &names(&self.outputs))
            .finish()
    }
}
