//! Simulation bench assembly.
//!
//! A [`Bench`] is the static description of a simulated system: a tree of
//! components whose leaves are atomic models and whose branches are coupled
//! components. Each coupled component owns an ordered list of children and
//! three sets of couplings:
//!
//! * external-input couplings (EIC), from one of its own input ports to an
//!   input port of a child,
//! * internal couplings (IC), from an output port of a child to an input port
//!   of a child,
//! * external-output couplings (EOC), from an output port of a child to one of
//!   its own output ports.
//!
//! Components are stored in an arena and referred to by [`ComponentId`]; the
//! parent of a component is an index into the same arena, which keeps the
//! [flattening](Bench::flatten) algorithm a pure rewrite of indices.
//!
//! # Examples
//!
//! ```
//! use pdevs::bench::{Bench, CouplingKind};
//! # use pdevs::model::{Atomic, Context, State};
//! # use pdevs::ports::{InPort, OutPort, PortSet};
//! # struct Relay { state: State, input: InPort<u32>, output: OutPort<u32> }
//! # impl Relay {
//! #     fn new(ports: &mut PortSet) -> Self {
//! #         Self { state: State::default(), input: ports.add_input("in"), output: ports.add_output("out") }
//! #     }
//! # }
//! # impl Atomic for Relay {
//! #     type Phase = pdevs::model::BasicPhase;
//! #     fn state(&self) -> &State { &self.state }
//! #     fn state_mut(&mut self) -> &mut State { &mut self.state }
//! #     fn delta_int(&mut self, _: &mut Context<'_>) { self.state.passivate() }
//! #     fn delta_ext(&mut self, _: f64, _: &mut Context<'_>) { self.state.activate() }
//! #     fn lambda(&self, _: &mut Context<'_>) {}
//! # }
//!
//! let mut bench = Bench::new("top");
//! let root = bench.root();
//! bench.add_in_port::<u32>(root, "in")?;
//! let a = bench.add_atomic(root, "a", Relay::new)?;
//! let b = bench.add_atomic(root, "b", Relay::new)?;
//!
//! assert_eq!(bench.connect(root, "top", "in", "a", "in")?, CouplingKind::ExternalInput);
//! assert_eq!(bench.connect(root, "a", "out", "b", "in")?, CouplingKind::Internal);
//! assert_eq!(bench.qualified_name(b)?, "top.b");
//! assert_eq!(bench.count_atomics(), 2);
//! # let _ = a;
//! # Ok::<(), pdevs::bench::ModelError>(())
//! ```
mod flatten;

use std::any::{self, TypeId};
use std::error::Error;
use std::fmt::{self, Write};

use slab::Slab;

use crate::model::{Atomic, DynAtomic};
use crate::ports::{
    AnyPort, Direction, EventSink, Forwarder, PortId, PortSet, SinkForward, Value,
};

/// Identifier of a component within a [`Bench`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) usize);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A directed wire between two ports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Coupling {
    pub(crate) from: PortId,
    pub(crate) to: PortId,
}

impl Coupling {
    pub(crate) fn new(from: PortId, to: PortId) -> Self {
        Self { from, to }
    }

    /// Returns the source port.
    pub fn from(&self) -> PortId {
        self.from
    }

    /// Returns the destination port.
    pub fn to(&self) -> PortId {
        self.to
    }
}

/// The class of a coupling relative to the coupled component that owns it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CouplingKind {
    /// From an input port of the owner to an input port of a child.
    ExternalInput,
    /// From an output port of a child to an input port of a child.
    Internal,
    /// From an output port of a child to an output port of the owner.
    ExternalOutput,
}

impl fmt::Display for CouplingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExternalInput => f.write_str("EIC"),
            Self::Internal => f.write_str("IC"),
            Self::ExternalOutput => f.write_str("EOC"),
        }
    }
}

/// Children and couplings of a coupled component.
#[derive(Default)]
pub(crate) struct Network {
    pub(crate) children: Vec<ComponentId>,
    pub(crate) eic: Vec<Coupling>,
    pub(crate) ic: Vec<Coupling>,
    pub(crate) eoc: Vec<Coupling>,
}

impl Network {
    pub(crate) fn couplings(&self, kind: CouplingKind) -> &Vec<Coupling> {
        match kind {
            CouplingKind::ExternalInput => &self.eic,
            CouplingKind::Internal => &self.ic,
            CouplingKind::ExternalOutput => &self.eoc,
        }
    }

    pub(crate) fn couplings_mut(&mut self, kind: CouplingKind) -> &mut Vec<Coupling> {
        match kind {
            CouplingKind::ExternalInput => &mut self.eic,
            CouplingKind::Internal => &mut self.ic,
            CouplingKind::ExternalOutput => &mut self.eoc,
        }
    }
}

pub(crate) enum ComponentKind {
    Atomic(Box<dyn DynAtomic>),
    Coupled(Network),
}

pub(crate) struct Component {
    pub(crate) name: String,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) ports: PortSet,
    pub(crate) kind: ComponentKind,
}

impl Component {
    fn network(&self) -> Option<&Network> {
        match &self.kind {
            ComponentKind::Coupled(network) => Some(network),
            ComponentKind::Atomic(_) => None,
        }
    }
}

/// A hierarchical simulation bench.
pub struct Bench {
    pub(crate) components: Slab<Component>,
    pub(crate) root: ComponentId,
    pub(crate) sinks: Vec<(usize, Box<dyn SinkForward>)>,
}

impl Bench {
    /// Creates a bench whose root is an empty coupled component.
    pub fn new(name: impl Into<String>) -> Self {
        let mut components = Slab::new();
        let root = ComponentId(components.insert(Component {
            name: name.into(),
            parent: None,
            ports: PortSet::new(),
            kind: ComponentKind::Coupled(Network::default()),
        }));

        Self {
            components,
            root,
            sinks: Vec::new(),
        }
    }

    /// Returns the root component.
    pub fn root(&self) -> ComponentId {
        self.root
    }

    pub(crate) fn component(&self, id: ComponentId) -> Result<&Component, ModelError> {
        self.components
            .get(id.0)
            .ok_or(ModelError::UnknownComponent(id))
    }

    pub(crate) fn component_mut(&mut self, id: ComponentId) -> Result<&mut Component, ModelError> {
        self.components
            .get_mut(id.0)
            .ok_or(ModelError::UnknownComponent(id))
    }

    pub(crate) fn network(&self, id: ComponentId) -> Result<&Network, ModelError> {
        let component = self.component(id)?;
        component
            .network()
            .ok_or_else(|| ModelError::NotCoupled(component.name.clone()))
    }

    pub(crate) fn network_mut(&mut self, id: ComponentId) -> Result<&mut Network, ModelError> {
        let component = self.component_mut(id)?;
        match &mut component.kind {
            ComponentKind::Coupled(network) => Ok(network),
            ComponentKind::Atomic(_) => Err(ModelError::NotCoupled(component.name.clone())),
        }
    }

    /// Adds an empty coupled component to a coupled parent.
    pub fn add_coupled(
        &mut self,
        parent: ComponentId,
        name: impl Into<String>,
    ) -> Result<ComponentId, ModelError> {
        self.insert_child(
            parent,
            name.into(),
            PortSet::new(),
            ComponentKind::Coupled(Network::default()),
        )
    }

    /// Adds an atomic model to a coupled parent.
    ///
    /// The model is built by `build`, which declares the model ports on the
    /// provided [`PortSet`].
    pub fn add_atomic<M, F>(
        &mut self,
        parent: ComponentId,
        name: impl Into<String>,
        build: F,
    ) -> Result<ComponentId, ModelError>
    where
        M: Atomic,
        F: FnOnce(&mut PortSet) -> M,
    {
        let name = name.into();
        let mut ports = PortSet::new();
        let model = build(&mut ports);
        if let Some(port) = ports.duplicate() {
            return Err(ModelError::DuplicatePort {
                component: name,
                port: port.to_string(),
            });
        }

        self.insert_child(parent, name, ports, ComponentKind::Atomic(Box::new(model)))
    }

    fn insert_child(
        &mut self,
        parent: ComponentId,
        name: String,
        ports: PortSet,
        kind: ComponentKind,
    ) -> Result<ComponentId, ModelError> {
        if self.child_id(parent, &name)?.is_some() {
            return Err(ModelError::DuplicateComponent {
                parent: self.qualified_name(parent)?,
                name,
            });
        }
        let id = ComponentId(self.components.insert(Component {
            name,
            parent: Some(parent),
            ports,
            kind,
        }));
        self.network_mut(parent)?.children.push(id);

        Ok(id)
    }

    /// Declares an input port on a coupled component.
    pub fn add_in_port<T: Value>(
        &mut self,
        component: ComponentId,
        name: impl Into<String>,
    ) -> Result<PortId, ModelError> {
        self.add_port::<T>(component, Direction::Input, name.into())
    }

    /// Declares an output port on a coupled component.
    pub fn add_out_port<T: Value>(
        &mut self,
        component: ComponentId,
        name: impl Into<String>,
    ) -> Result<PortId, ModelError> {
        self.add_port::<T>(component, Direction::Output, name.into())
    }

    fn add_port<T: Value>(
        &mut self,
        component: ComponentId,
        direction: Direction,
        name: String,
    ) -> Result<PortId, ModelError> {
        self.network(component)?;
        let target = self.component_mut(component)?;
        if target.ports.find(direction, &name).is_some() {
            return Err(ModelError::DuplicatePort {
                component: target.name.clone(),
                port: name,
            });
        }
        let index = target.ports.add::<T>(direction, name);

        Ok(PortId {
            component,
            direction,
            index,
        })
    }

    /// Looks up an input port by name.
    pub fn in_port(&self, component: ComponentId, name: &str) -> Result<PortId, ModelError> {
        self.port(component, Direction::Input, name)
    }

    /// Looks up an output port by name.
    pub fn out_port(&self, component: ComponentId, name: &str) -> Result<PortId, ModelError> {
        self.port(component, Direction::Output, name)
    }

    fn port(
        &self,
        component: ComponentId,
        direction: Direction,
        name: &str,
    ) -> Result<PortId, ModelError> {
        let target = self.component(component)?;
        let index = target
            .ports
            .find(direction, name)
            .ok_or_else(|| ModelError::UnknownPort {
                component: target.name.clone(),
                direction,
                port: name.to_string(),
            })?;

        Ok(PortId {
            component,
            direction,
            index,
        })
    }

    /// Returns the qualified name of a port, e.g. `top.a.out`.
    pub fn port_name(&self, port: PortId) -> Result<String, ModelError> {
        let mut name = self.qualified_name(port.component)?;
        let ports = &self.component(port.component)?.ports;
        let local = ports
            .get(port.direction, port.index)
            .map(|p| p.name())
            .unwrap_or("?");
        name.push('.');
        name.push_str(local);

        Ok(name)
    }

    /// Adds a coupling to a coupled component and returns its class.
    ///
    /// The class is derived from the position of the ports relative to
    /// `parent`. Ports must carry the same value type.
    pub fn add_coupling(
        &mut self,
        parent: ComponentId,
        from: PortId,
        to: PortId,
    ) -> Result<CouplingKind, ModelError> {
        let network = self.network(parent)?;
        let is_child = |id: ComponentId| network.children.contains(&id);

        let kind = match (from.direction, to.direction) {
            (Direction::Input, Direction::Input)
                if from.component == parent && is_child(to.component) =>
            {
                CouplingKind::ExternalInput
            }
            (Direction::Output, Direction::Input)
                if is_child(from.component) && is_child(to.component) =>
            {
                CouplingKind::Internal
            }
            (Direction::Output, Direction::Output)
                if is_child(from.component) && to.component == parent =>
            {
                CouplingKind::ExternalOutput
            }
            _ => {
                return Err(ModelError::InvalidCoupling {
                    owner: self.qualified_name(parent)?,
                    from: self.port_name(from)?,
                    to: self.port_name(to)?,
                })
            }
        };

        let src = self.port_ref(from)?;
        let dst = self.port_ref(to)?;
        if src.value_type() != dst.value_type() {
            return Err(ModelError::TypeMismatch {
                from: self.port_name(from)?,
                from_type: src.value_type_name(),
                to: self.port_name(to)?,
                to_type: dst.value_type_name(),
            });
        }

        self.network_mut(parent)?
            .couplings_mut(kind)
            .push(Coupling::new(from, to));

        Ok(kind)
    }

    /// Adds a coupling between ports designated by component and port names.
    ///
    /// Component names are resolved among the children of `parent`; the name
    /// of `parent` itself designates its own boundary ports.
    pub fn connect(
        &mut self,
        parent: ComponentId,
        from_component: &str,
        from_port: &str,
        to_component: &str,
        to_port: &str,
    ) -> Result<CouplingKind, ModelError> {
        let src = self.child_by_name(parent, from_component)?;
        let dst = self.child_by_name(parent, to_component)?;
        let from = if src == parent {
            self.in_port(src, from_port)?
        } else {
            self.out_port(src, from_port)?
        };
        let to = if dst == parent {
            self.out_port(dst, to_port)?
        } else {
            self.in_port(dst, to_port)?
        };

        self.add_coupling(parent, from, to)
    }

    fn port_ref(&self, port: PortId) -> Result<&dyn AnyPort, ModelError> {
        let component = self.component(port.component)?;
        component
            .ports
            .get(port.direction, port.index)
            .ok_or_else(|| ModelError::UnknownPort {
                component: component.name.clone(),
                direction: port.direction,
                port: format!("#{}", port.index),
            })
    }

    /// Connects an output port of the root component to an event sink.
    ///
    /// Every value leaving the port is written to the sink together with the
    /// simulation time at which it was produced.
    pub fn add_sink<T, S>(&mut self, port: PortId, sink: &S) -> Result<(), ModelError>
    where
        T: Value,
        S: EventSink<(f64, T)>,
    {
        if port.component != self.root || port.direction != Direction::Output {
            return Err(ModelError::NotRootOutput(self.port_name(port)?));
        }
        let target = self.port_ref(port)?;
        if target.value_type() != TypeId::of::<T>() {
            return Err(ModelError::TypeMismatch {
                from: self.port_name(port)?,
                from_type: target.value_type_name(),
                to: "sink".to_string(),
                to_type: any::type_name::<T>(),
            });
        }
        self.sinks
            .push((port.index, Box::new(Forwarder::<T, _>::new(sink.writer()))));

        Ok(())
    }

    /// Returns the local name of a component.
    pub fn name(&self, id: ComponentId) -> Result<&str, ModelError> {
        Ok(&self.component(id)?.name)
    }

    /// Returns the dot-separated path of a component from the root.
    pub fn qualified_name(&self, id: ComponentId) -> Result<String, ModelError> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let component = self.component(id)?;
            segments.push(component.name.as_str());
            current = component.parent;
        }
        segments.reverse();

        Ok(segments.join("."))
    }

    /// Returns the parent of a component, or `None` for the root.
    pub fn parent(&self, id: ComponentId) -> Result<Option<ComponentId>, ModelError> {
        Ok(self.component(id)?.parent)
    }

    /// Returns the children of a component in insertion order.
    ///
    /// The list is empty for atomic components.
    pub fn children(&self, id: ComponentId) -> Result<&[ComponentId], ModelError> {
        Ok(self
            .component(id)?
            .network()
            .map(|n| n.children.as_slice())
            .unwrap_or(&[]))
    }

    /// Finds a child of a coupled component by name.
    ///
    /// The name of the coupled component itself resolves to the coupled
    /// component.
    pub fn child_by_name(
        &self,
        parent: ComponentId,
        name: &str,
    ) -> Result<ComponentId, ModelError> {
        if self.component(parent)?.name == name {
            self.network(parent)?;
            return Ok(parent);
        }

        match self.child_id(parent, name)? {
            Some(id) => Ok(id),
            None => Err(ModelError::UnknownChild {
                parent: self.qualified_name(parent)?,
                name: name.to_string(),
            }),
        }
    }

    fn child_id(&self, parent: ComponentId, name: &str) -> Result<Option<ComponentId>, ModelError> {
        let network = self.network(parent)?;

        Ok(network
            .children
            .iter()
            .copied()
            .find(|&id| self.components.get(id.0).is_some_and(|c| c.name == name)))
    }

    /// Checks whether a component is an atomic model.
    pub fn is_atomic(&self, id: ComponentId) -> Result<bool, ModelError> {
        Ok(self.component(id)?.network().is_none())
    }

    /// Returns the couplings of the given class owned by a coupled component.
    pub fn couplings(
        &self,
        id: ComponentId,
        kind: CouplingKind,
    ) -> Result<&[Coupling], ModelError> {
        Ok(self.network(id)?.couplings(kind))
    }

    /// Returns the number of atomic models in the bench.
    pub fn count_atomics(&self) -> usize {
        self.components
            .iter()
            .filter(|(_, c)| c.network().is_none())
            .count()
    }

    /// Returns a human-readable listing of the component tree and of the
    /// couplings of every coupled component.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_component(self.root, 0, &mut out);

        out
    }

    fn describe_component(&self, id: ComponentId, depth: usize, out: &mut String) {
        let Some(component) = self.components.get(id.0) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let port_names = |direction: Direction| {
            component
                .ports
                .list(direction)
                .iter()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = writeln!(
            out,
            "{}{} [{}] in({}) out({})",
            indent,
            component.name,
            if component.network().is_some() {
                "coupled"
            } else {
                "atomic"
            },
            port_names(Direction::Input),
            port_names(Direction::Output),
        );

        if let Some(network) = component.network() {
            for kind in [
                CouplingKind::ExternalInput,
                CouplingKind::Internal,
                CouplingKind::ExternalOutput,
            ] {
                for coupling in network.couplings(kind) {
                    let _ = writeln!(
                        out,
                        "{}  {} {} -> {}",
                        indent,
                        kind,
                        self.port_name(coupling.from)
                            .unwrap_or_else(|_| "?".to_string()),
                        self.port_name(coupling.to)
                            .unwrap_or_else(|_| "?".to_string()),
                    );
                }
            }
            for &child in &network.children {
                self.describe_component(child, depth + 1, out);
            }
        }
    }
}

impl fmt::Debug for Bench {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bench")
            .field("root", &self.root)
            .field("components", &self.components.len())
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}

/// Error returned when a bench is assembled inconsistently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelError {
    /// The component identifier does not exist or was removed by flattening.
    UnknownComponent(ComponentId),
    /// No child of the coupled component has this name.
    UnknownChild {
        /// Qualified name of the coupled component.
        parent: String,
        /// Name looked up.
        name: String,
    },
    /// The component has no port with this name and direction.
    UnknownPort {
        /// Name of the component.
        component: String,
        /// Direction of the port looked up.
        direction: Direction,
        /// Name of the port looked up.
        port: String,
    },
    /// A sibling with the same name already exists.
    DuplicateComponent {
        /// Qualified name of the parent.
        parent: String,
        /// Duplicate name.
        name: String,
    },
    /// A port with the same name and direction already exists.
    DuplicatePort {
        /// Name of the component.
        component: String,
        /// Duplicate name.
        port: String,
    },
    /// The two ports of a coupling carry different value types.
    TypeMismatch {
        /// Qualified name of the source port.
        from: String,
        /// Value type of the source port.
        from_type: &'static str,
        /// Qualified name of the destination port.
        to: String,
        /// Value type of the destination port.
        to_type: &'static str,
    },
    /// The ports are not positioned as an EIC, IC or EOC of the owner.
    InvalidCoupling {
        /// Qualified name of the coupled component owning the coupling.
        owner: String,
        /// Qualified name of the source port.
        from: String,
        /// Qualified name of the destination port.
        to: String,
    },
    /// The operation requires a coupled component.
    NotCoupled(String),
    /// The operation requires a component with a parent.
    NoParent(String),
    /// Event sinks can only observe output ports of the root component.
    NotRootOutput(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownComponent(id) => write!(fmt, "no component with identifier {}", id),
            Self::UnknownChild { parent, name } => {
                write!(fmt, "component '{}' has no child named '{}'", parent, name)
            }
            Self::UnknownPort {
                component,
                direction,
                port,
            } => write!(
                fmt,
                "component '{}' has no {} port named '{}'",
                component, direction, port
            ),
            Self::DuplicateComponent { parent, name } => write!(
                fmt,
                "component '{}' already has a child named '{}'",
                parent, name
            ),
            Self::DuplicatePort { component, port } => write!(
                fmt,
                "component '{}' declares port '{}' more than once",
                component, port
            ),
            Self::TypeMismatch {
                from,
                from_type,
                to,
                to_type,
            } => write!(
                fmt,
                "cannot couple '{}' ({}) to '{}' ({})",
                from, from_type, to, to_type
            ),
            Self::InvalidCoupling { owner, from, to } => write!(
                fmt,
                "'{}' -> '{}' is not a valid coupling of component '{}'",
                from, to, owner
            ),
            Self::NotCoupled(name) => {
                write!(fmt, "component '{}' is not a coupled component", name)
            }
            Self::NoParent(name) => write!(fmt, "component '{}' has no parent", name),
            Self::NotRootOutput(port) => write!(
                fmt,
                "port '{}' is not an output port of the root component",
                port
            ),
        }
    }
}

impl Error for ModelError {}
