//! A discrete-event simulation kernel implementing the Parallel DEVS
//! formalism.
//!
//! Systems are described as trees of components. The leaves are _atomic
//! models_: timed state machines with typed input and output ports. The inner
//! nodes are _coupled components_, whose only role is to route the values
//! leaving the ports of their children along _couplings_. Simulating the tree
//! consists of repeatedly advancing the simulation time to the next scheduled
//! event and letting every affected model compute its outputs and update its
//! state.
//!
//! The same model tree can be executed sequentially, on a pool of worker
//! threads, or with each atomic model hosted by a remote node.
//!
//! # A practical overview
//!
//! Simulating a system involves three activities:
//!
//! 1. the design of atomic models for each sub-system,
//! 2. the assembly of a [`Bench`](bench::Bench), performed by declaring
//!    coupled components and coupling their ports,
//! 3. the execution of the simulation, during which external values may be
//!    injected and the outputs of the system observed.
//!
//! ## Authoring models
//!
//! An atomic model implements the [`Atomic`](model::Atomic) trait. Its state
//! consists of a [`State`](model::State), that is a phase and the time
//! remaining before the next internal event (`sigma`), plus any variables the
//! model needs. Four functions define its behavior:
//!
//! * [`lambda()`](model::Atomic::lambda), the output function, called just
//!   before an internal event,
//! * [`delta_int()`](model::Atomic::delta_int), the internal transition, run
//!   when `sigma` expires,
//! * [`delta_ext()`](model::Atomic::delta_ext), the external transition, run
//!   when values arrive on the input ports,
//! * [`delta_con()`](model::Atomic::delta_con), the confluent transition, run
//!   when both happen at the same time.
//!
//! Ports are declared when the model is built, on the
//! [`PortSet`](ports::PortSet) handed over by the bench:
//!
//! ```
//! use pdevs::model::{Atomic, BasicPhase, Context, State};
//! use pdevs::ports::{OutPort, PortSet};
//!
//! /// Emits an increasing count at a fixed period.
//! pub struct Counter {
//!     state: State,
//!     period: f64,
//!     count: u64,
//!     output: OutPort<u64>,
//! }
//!
//! impl Counter {
//!     pub fn new(period: f64, ports: &mut PortSet) -> Self {
//!         Self {
//!             state: State::new(BasicPhase::Active, period),
//!             period,
//!             count: 0,
//!             output: ports.add_output("count"),
//!         }
//!     }
//! }
//!
//! impl Atomic for Counter {
//!     type Phase = BasicPhase;
//!
//!     fn state(&self) -> &State {
//!         &self.state
//!     }
//!     fn state_mut(&mut self) -> &mut State {
//!         &mut self.state
//!     }
//!     fn delta_int(&mut self, _: &mut Context<'_>) {
//!         self.count += 1;
//!         self.state.hold_in(BasicPhase::Active, self.period);
//!     }
//!     fn delta_ext(&mut self, _: f64, _: &mut Context<'_>) {}
//!     fn lambda(&self, ctx: &mut Context<'_>) {
//!         ctx.send(&self.output, self.count + 1);
//!     }
//! }
//! ```
//!
//! ## Assembling a bench
//!
//! The [`Bench`](bench::Bench) owns all components. Couplings are classified
//! automatically as external input (EIC), internal (IC) or external output
//! (EOC) couplings depending on the components they join, and are checked for
//! type consistency.
//!
//! The output ports of the root component may be connected to an
//! [`EventSink`](ports::EventSink) to observe the values leaving the system.
//!
//! ## Running a simulation
//!
//! A [`SimInit`](simulation::SimInit) builder selects the execution strategy
//! and returns a [`Simulation`](simulation::Simulation), which owns the clock
//! and drives the root executor:
//!
//! ```
//! # use pdevs::model::{Atomic, BasicPhase, Context, State};
//! # use pdevs::ports::{OutPort, PortSet};
//! # pub struct Counter { state: State, period: f64, count: u64, output: OutPort<u64> }
//! # impl Counter {
//! #     pub fn new(period: f64, ports: &mut PortSet) -> Self {
//! #         Self { state: State::new(BasicPhase::Active, period), period, count: 0, output: ports.add_output("count") }
//! #     }
//! # }
//! # impl Atomic for Counter {
//! #     type Phase = BasicPhase;
//! #     fn state(&self) -> &State { &self.state }
//! #     fn state_mut(&mut self) -> &mut State { &mut self.state }
//! #     fn delta_int(&mut self, _: &mut Context<'_>) {
//! #         self.count += 1;
//! #         self.state.hold_in(BasicPhase::Active, self.period);
//! #     }
//! #     fn delta_ext(&mut self, _: f64, _: &mut Context<'_>) {}
//! #     fn lambda(&self, ctx: &mut Context<'_>) { ctx.send(&self.output, self.count + 1); }
//! # }
//! use pdevs::bench::Bench;
//! use pdevs::ports::EventBuffer;
//! use pdevs::simulation::SimInit;
//!
//! let mut bench = Bench::new("clock");
//! let root = bench.root();
//! bench.add_atomic(root, "counter", |ports| Counter::new(0.5, ports))?;
//! let ticks = bench.add_out_port::<u64>(root, "ticks")?;
//! bench.connect(root, "counter", "count", "clock", "ticks")?;
//!
//! let mut output = EventBuffer::<(f64, u64)>::new();
//! bench.add_sink(ticks, &output)?;
//!
//! let mut simulation = SimInit::new(bench).init(0.0)?;
//! simulation.simulate(3)?;
//!
//! assert_eq!(simulation.time(), 1.5);
//! assert_eq!(output.drain_all(), vec![(0.5, 1), (1.0, 2), (1.5, 3)]);
//!
//! simulation.exit()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Execution strategies
//!
//! By default, each coupled component is driven by a
//! [`Coordinator`](simulation::Coordinator) which runs its children one after
//! the other. [`SimInit::parallel()`](simulation::SimInit::parallel) instead
//! flattens the component tree and runs the phases of the atomic models on a
//! pool of worker threads. Both strategies produce the same outputs at the
//! same simulation times.
//!
//! The [`distributed`] module hosts each atomic model on a
//! [`NodeServer`](distributed::NodeServer) and drives them over TCP with a
//! [`DistributedCoordinator`](distributed::DistributedCoordinator).
//!
//! # Logging
//!
//! The kernel emits [`tracing`](https://docs.rs/tracing) events: the model
//! hierarchy and run boundaries at the `debug` level, individual steps and
//! transitions at the `trace` level. No subscriber is installed by the
//! library.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub mod bench;
pub mod distributed;
pub mod model;
pub mod ports;
pub mod runtime;
pub mod simulation;
pub mod time;
