use super::{Coordinator, ExecutionError, Simulator};

/// The phase interface shared by every executor of the simulation tree.
///
/// An executor drives either a single atomic model ([`Simulator`]) or a
/// network of child executors ([`Coordinator`],
/// [`DistributedCoordinator`](crate::distributed::DistributedCoordinator)).
/// The current simulation time is passed explicitly to every phase; only the
/// [`Simulation`](super::Simulation) driver owns and advances the clock.
///
/// Each simulation step consists of [`lambda()`](Self::lambda), then
/// [`delta()`](Self::delta), then [`clear()`](Self::clear), all called with
/// the time of the next event.
pub trait Executor: Send {
    /// Initializes the executor and its models at the given time.
    fn initialize(&mut self, time: f64) -> Result<(), ExecutionError>;

    /// Calls the teardown hook of every model.
    fn exit(&mut self) -> Result<(), ExecutionError>;

    /// Time of the last event.
    fn time_last(&self) -> f64;

    /// Time of the next scheduled event, or `f64::INFINITY`.
    fn time_next(&self) -> f64;

    /// Time remaining from `time` until the next scheduled event.
    fn time_advance(&self, time: f64) -> f64 {
        self.time_next() - time
    }

    /// Computes the outputs of the models whose next event is at `time`.
    fn lambda(&mut self, time: f64) -> Result<(), ExecutionError>;

    /// Runs the state transitions of the models that are imminent at `time`
    /// or received input.
    fn delta(&mut self, time: f64) -> Result<(), ExecutionError>;

    /// Empties every port.
    fn clear(&mut self) -> Result<(), ExecutionError>;

    /// Releases the resources held for the duration of a simulation run, such
    /// as worker threads.
    fn finish_run(&mut self) {}
}

/// A child of a coordinator.
pub(crate) enum Node {
    Leaf(Simulator),
    Branch(Coordinator),
}

impl Node {
    pub(crate) fn name(&self) -> &str {
        match self {
            Node::Leaf(s) => s.name(),
            Node::Branch(c) => c.name(),
        }
    }

    pub(crate) fn ports(&self) -> &crate::ports::PortSet {
        match self {
            Node::Leaf(s) => &s.ports,
            Node::Branch(c) => &c.ports,
        }
    }

    pub(crate) fn ports_mut(&mut self) -> &mut crate::ports::PortSet {
        match self {
            Node::Leaf(s) => &mut s.ports,
            Node::Branch(c) => &mut c.ports,
        }
    }

    pub(crate) fn executor(&mut self) -> &mut dyn Executor {
        match self {
            Node::Leaf(s) => s,
            Node::Branch(c) => c,
        }
    }

    pub(crate) fn time_next(&self) -> f64 {
        match self {
            Node::Leaf(s) => s.time_next(),
            Node::Branch(c) => c.time_next(),
        }
    }
}
