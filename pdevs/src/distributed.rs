//! Distributed execution.
//!
//! In a distributed simulation, each atomic model is hosted by a
//! [`NodeServer`], typically in its own process, and the root of the
//! simulation is a [`DistributedCoordinator`] which drives the nodes over TCP.
//!
//! All participants share a [`Directory`] mapping model names to socket
//! addresses and listing the couplings between models. Outputs are pushed
//! directly from node to node; the coordinator only broadcasts the phases of
//! each step and collects the next event times.
//!
//! The distributed coordinator has no boundary ports, so values cannot be
//! injected into a distributed simulation; the models are expected to be
//! self-driven. The [`wire`] module documents the message format.
//!
//! # Example
//!
//! ```no_run
//! use std::thread;
//!
//! use pdevs::distributed::{Directory, DistributedCoordinator, NodeServer};
//! use pdevs::simulation::{Simulation, Simulator};
//! # use pdevs::model::{Atomic, Context, State};
//! # use pdevs::ports::PortSet;
//! # struct Idle { state: State }
//! # impl Idle { fn new(_: &mut PortSet) -> Self { Self { state: State::default() } } }
//! # impl Atomic for Idle {
//! #     type Phase = pdevs::model::BasicPhase;
//! #     fn state(&self) -> &State { &self.state }
//! #     fn state_mut(&mut self) -> &mut State { &mut self.state }
//! #     fn delta_int(&mut self, _: &mut Context<'_>) {}
//! #     fn delta_ext(&mut self, _: f64, _: &mut Context<'_>) {}
//! #     fn lambda(&self, _: &mut Context<'_>) {}
//! # }
//!
//! let mut directory = Directory::new();
//! directory.add_node("idle", "127.0.0.1:5000".parse()?);
//!
//! // Usually started in another process.
//! let server = NodeServer::bind(&directory, "idle", Simulator::new("idle", Idle::new))?;
//! let node = thread::spawn(move || server.serve());
//!
//! let mut simulation = Simulation::new(DistributedCoordinator::new(&directory), 0.0)?;
//! simulation.simulate(100)?;
//! simulation.exit()?;
//! node.join().unwrap()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
mod coordinator;
mod directory;
mod node;
pub mod wire;

pub use coordinator::DistributedCoordinator;
pub use directory::{Directory, Link, NodeEntry};
pub use node::{NodeError, NodeServer};
pub use wire::WireError;

use std::net::{SocketAddr, TcpStream};

use tracing::trace;

use wire::{Request, Response};

/// Sends a request on a new connection and waits for the response.
pub(crate) fn call(address: SocketAddr, request: &Request) -> Result<Response, WireError> {
    trace!(%address, command = %request.command, "remote call");

    let mut stream = TcpStream::connect(address)?;
    stream.set_nodelay(true)?;
    wire::write_request(&mut stream, request)?;

    wire::read_response(&mut stream)
}
