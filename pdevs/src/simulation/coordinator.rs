use std::fmt;
use std::mem;

use tracing::debug;

use crate::bench::{Bench, ComponentId, ComponentKind, Coupling, ModelError, Network};
use crate::ports::{PortSet, SinkForward};

use super::fan_out::{run_guarded, FanOut, Sequential, Stage};
use super::{ExecutionError, Executor, Node, Simulator};

/// A resolved coupling: `None` designates the coordinator itself, `Some(i)`
/// its `i`-th child.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Route {
    from: Option<usize>,
    from_port: usize,
    to: Option<usize>,
    to_port: usize,
}

/// The executor of a coupled component.
///
/// A `Coordinator` owns one executor per child component, in the insertion
/// order of the children, and moves values along the couplings of the
/// component between phases: output couplings (IC then EOC) right after the
/// children computed their outputs, input couplings (EIC) right before the
/// children run their transitions.
///
/// How the children of the root coordinator are driven through each phase is
/// selected with [`SimInit`](super::SimInit); nested coordinators always
/// drive their children sequentially.
pub struct Coordinator {
    name: String,
    pub(crate) ports: PortSet,
    children: Vec<Node>,
    eic: Vec<Route>,
    ic: Vec<Route>,
    eoc: Vec<Route>,
    fan_out: Box<dyn FanOut>,
    sinks: Vec<(usize, Box<dyn SinkForward>)>,
    tl: f64,
    tn: f64,
}

impl Coordinator {
    /// Builds the executor tree of a bench.
    pub(crate) fn build(mut bench: Bench, fan_out: Box<dyn FanOut>) -> Result<Self, ModelError> {
        let root = bench.root;
        let sinks = mem::take(&mut bench.sinks);

        match Self::build_node(&mut bench, root, None, fan_out)? {
            Node::Branch(mut coordinator) => {
                coordinator.sinks = sinks;
                debug!(
                    name = coordinator.name.as_str(),
                    children = coordinator.children.len(),
                    eic = coordinator.eic.len(),
                    ic = coordinator.ic.len(),
                    eoc = coordinator.eoc.len(),
                    "executor tree built"
                );

                Ok(coordinator)
            }
            Node::Leaf(simulator) => Err(ModelError::NotCoupled(simulator.name().to_string())),
        }
    }

    fn build_node(
        bench: &mut Bench,
        id: ComponentId,
        prefix: Option<&str>,
        fan_out: Box<dyn FanOut>,
    ) -> Result<Node, ModelError> {
        let component = bench
            .components
            .try_remove(id.0)
            .ok_or(ModelError::UnknownComponent(id))?;
        let name = match prefix {
            Some(prefix) => format!("{}.{}", prefix, component.name),
            None => component.name.clone(),
        };

        match component.kind {
            ComponentKind::Atomic(model) => Ok(Node::Leaf(Simulator::from_parts(
                name,
                model,
                component.ports,
            ))),
            ComponentKind::Coupled(network) => Ok(Node::Branch(Self::assemble(
                bench,
                id,
                name,
                component.ports,
                network,
                fan_out,
            )?)),
        }
    }

    fn assemble(
        bench: &mut Bench,
        id: ComponentId,
        name: String,
        ports: PortSet,
        network: Network,
        fan_out: Box<dyn FanOut>,
    ) -> Result<Self, ModelError> {
        let children = network
            .children
            .iter()
            .map(|&child| Self::build_node(bench, child, Some(&name), Box::new(Sequential)))
            .collect::<Result<Vec<_>, _>>()?;

        let position = |component: ComponentId| {
            if component == id {
                None
            } else {
                network.children.iter().position(|&c| c == component)
            }
        };
        let routes = |couplings: &[Coupling]| {
            couplings
                .iter()
                .map(|c| Route {
                    from: position(c.from.component),
                    from_port: c.from.index,
                    to: position(c.to.component),
                    to_port: c.to.index,
                })
                .collect::<Vec<_>>()
        };

        Ok(Self {
            eic: routes(&network.eic),
            ic: routes(&network.ic),
            eoc: routes(&network.eoc),
            name,
            ports,
            children,
            fan_out,
            sinks: Vec::new(),
            tl: 0.0,
            tn: f64::INFINITY,
        })
    }

    /// Returns the (qualified) name of the coupled component.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of child executors.
    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    fn min_child_time_next(&self) -> f64 {
        self.children
            .iter()
            .map(Node::time_next)
            .fold(f64::INFINITY, f64::min)
    }

    /// Copies input port values along the EIC.
    fn propagate_input(&mut self) {
        for route in &self.eic {
            let src = &self.ports.inputs[route.from_port];
            if src.is_empty() {
                continue;
            }
            if let Some(to) = route.to {
                let dst = &mut self.children[to].ports_mut().inputs[route.to_port];
                src.copy_into(dst.as_mut());
            }
        }
    }

    /// Copies child output values along the IC, then along the EOC.
    fn propagate_output(&mut self) {
        for route in &self.ic {
            let (Some(from), Some(to)) = (route.from, route.to) else {
                continue;
            };
            if from == to {
                let ports = self.children[from].ports_mut();
                ports.outputs[route.from_port].copy_into(ports.inputs[route.to_port].as_mut());
            } else {
                let (src, dst) = pair_mut(&mut self.children, from, to);
                src.ports().outputs[route.from_port]
                    .copy_into(dst.ports_mut().inputs[route.to_port].as_mut());
            }
        }
        for route in &self.eoc {
            if let Some(from) = route.from {
                self.children[from].ports().outputs[route.from_port]
                    .copy_into(self.ports.outputs[route.to_port].as_mut());
            }
        }
    }
}

/// Returns a shared reference to `items[src]` and a mutable reference to
/// `items[dst]`, with `src != dst`.
fn pair_mut<T>(items: &mut [T], src: usize, dst: usize) -> (&T, &mut T) {
    if src < dst {
        let (left, right) = items.split_at_mut(dst);
        (&left[src], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(src);
        (&right[0], &mut left[dst])
    }
}

impl Executor for Coordinator {
    fn initialize(&mut self, time: f64) -> Result<(), ExecutionError> {
        run_guarded(self.children.iter_mut(), |node| {
            node.executor().initialize(time)
        })?;
        self.tl = time;
        self.tn = self.min_child_time_next();

        Ok(())
    }

    fn exit(&mut self) -> Result<(), ExecutionError> {
        let result = run_guarded(self.children.iter_mut(), |node| node.executor().exit());
        self.fan_out.finish_run();

        result
    }

    fn time_last(&self) -> f64 {
        self.tl
    }

    fn time_next(&self) -> f64 {
        self.tn
    }

    fn lambda(&mut self, time: f64) -> Result<(), ExecutionError> {
        if time != self.tn {
            return Ok(());
        }
        self.fan_out.run(Stage::Lambda, &mut self.children, time)?;
        self.propagate_output();

        for (port, sink) in &self.sinks {
            sink.forward(time, self.ports.outputs[*port].as_ref());
        }

        Ok(())
    }

    fn delta(&mut self, time: f64) -> Result<(), ExecutionError> {
        if time != self.tn && self.ports.is_input_empty() {
            return Ok(());
        }
        self.propagate_input();
        self.fan_out.run(Stage::Delta, &mut self.children, time)?;
        self.tl = time;
        self.tn = self.min_child_time_next();

        Ok(())
    }

    fn clear(&mut self) -> Result<(), ExecutionError> {
        for child in &mut self.children {
            child.executor().clear()?;
        }
        self.ports.clear();

        Ok(())
    }

    fn finish_run(&mut self) {
        self.fan_out.finish_run();
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("name", &self.name)
            .field("children", &self.children.len())
            .field("tl", &self.tl)
            .field("tn", &self.tn)
            .finish_non_exhaustive()
    }
}
