use std::error::Error;
use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use tracing::{debug, error, trace, warn};

use crate::ports::Direction;
use crate::simulation::{ExecutionError, Executor, Simulator};
use crate::time::format_time;

use super::wire::{self, Command, Request, Response, Status, Transfer};
use super::{call, Directory};

/// An outbound link resolved against the model ports and the directory.
#[derive(Debug)]
struct Route {
    from_port: usize,
    to_node: String,
    address: SocketAddr,
    to_port: String,
}

/// A server hosting one atomic model of a distributed simulation.
///
/// The server executes the commands sent by a
/// [`DistributedCoordinator`](super::DistributedCoordinator) and pushes the
/// outputs of its model directly to the servers of the coupled models, as
/// listed in the [`Directory`].
///
/// Each connection carries a single request. Requests are processed
/// concurrently, but accesses to the model are serialized.
pub struct NodeServer {
    name: String,
    listener: TcpListener,
    simulator: Mutex<Simulator>,
    routes: Vec<Route>,
}

impl NodeServer {
    /// Creates a server listening on the address registered for `name` in
    /// the directory.
    pub fn bind(
        directory: &Directory,
        name: &str,
        simulator: Simulator,
    ) -> Result<Self, NodeError> {
        let address = directory
            .address(name)
            .ok_or_else(|| NodeError::UnknownNode(name.to_string()))?;
        let listener = TcpListener::bind(address).map_err(NodeError::Bind)?;

        Self::with_listener(listener, directory, name, simulator)
    }

    /// Creates a server accepting connections from an already bound listener.
    pub fn with_listener(
        listener: TcpListener,
        directory: &Directory,
        name: &str,
        simulator: Simulator,
    ) -> Result<Self, NodeError> {
        let entry = directory
            .node(name)
            .ok_or_else(|| NodeError::UnknownNode(name.to_string()))?;

        let routes = entry
            .links
            .iter()
            .map(|link| {
                let from_port = simulator
                    .ports
                    .find(Direction::Output, &link.from_port)
                    .ok_or_else(|| NodeError::UnknownPort {
                        node: name.to_string(),
                        port: link.from_port.clone(),
                    })?;
                let address = directory
                    .address(&link.to_node)
                    .ok_or_else(|| NodeError::UnknownNode(link.to_node.clone()))?;

                Ok(Route {
                    from_port,
                    to_node: link.to_node.clone(),
                    address,
                    to_port: link.to_port.clone(),
                })
            })
            .collect::<Result<Vec<_>, NodeError>>()?;

        Ok(Self {
            name: name.to_string(),
            listener,
            simulator: Mutex::new(simulator),
            routes,
        })
    }

    /// Returns the address the server listens on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves requests until an `EXIT` command is received.
    ///
    /// Requests still in flight when `EXIT` arrives are completed before this
    /// method returns.
    pub fn serve(self) -> Result<(), NodeError> {
        let server = &self;
        debug!(node = server.name.as_str(), "node server started");

        crossbeam_utils::thread::scope(|s| {
            for stream in server.listener.incoming() {
                let mut stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(node = server.name.as_str(), "failed connection: {}", e);
                        continue;
                    }
                };
                let request = match wire::read_request(&mut stream) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!(node = server.name.as_str(), "malformed request: {}", e);
                        server.reply(&mut stream, &Response::error(e.to_string()));
                        continue;
                    }
                };

                if request.command == Command::Exit {
                    let response = server.handle(&request);
                    server.reply(&mut stream, &response);
                    break;
                }

                s.spawn(move |_| {
                    let response = server.handle(&request);
                    server.reply(&mut stream, &response);
                });
            }
        })
        .map_err(|_| NodeError::HandlerPanicked)?;

        debug!(node = self.name.as_str(), "node server stopped");

        Ok(())
    }

    fn reply(&self, stream: &mut TcpStream, response: &Response) {
        if let Err(e) = wire::write_response(stream, response) {
            warn!(node = self.name.as_str(), "response could not be sent: {}", e);
        }
    }

    fn handle(&self, request: &Request) -> Response {
        trace!(node = self.name.as_str(), command = %request.command, "request");

        match self.execute(request) {
            Ok(message) => Response::ok(message),
            Err(message) => {
                error!(
                    node = self.name.as_str(),
                    command = %request.command,
                    "{}",
                    message
                );
                Response::error(message)
            }
        }
    }

    fn execute(&self, request: &Request) -> Result<String, String> {
        match request.command {
            Command::Initialize => {
                let time = request.time().map_err(|e| e.to_string())?;
                self.with_simulator(|sim| sim.initialize(time))?;
                Ok("initialized".to_string())
            }
            Command::TimeAdvance => self.with_simulator(|sim| Ok(format_time(sim.time_next()))),
            Command::Lambda => {
                let time = request.time().map_err(|e| e.to_string())?;
                self.with_simulator(|sim| sim.lambda(time))?;
                Ok("outputs computed".to_string())
            }
            Command::PropagateOutput => self.propagate_output(),
            Command::PropagateOutputN2N => {
                let transfer = request.to_transfer().map_err(|e| e.to_string())?;
                self.receive(&transfer)
            }
            Command::Deltfcn => {
                let time = request.time().map_err(|e| e.to_string())?;
                self.with_simulator(|sim| sim.delta(time))?;
                Ok("transition done".to_string())
            }
            Command::Clear => {
                self.with_simulator(|sim| sim.clear())?;
                Ok("ports cleared".to_string())
            }
            Command::Exit => {
                self.with_simulator(|sim| sim.exit())?;
                Ok("bye".to_string())
            }
        }
    }

    /// Runs `f` on the model, turning a model panic into an error message.
    fn with_simulator<T, F>(&self, f: F) -> Result<T, String>
    where
        F: FnOnce(&mut Simulator) -> Result<T, ExecutionError>,
    {
        let mut simulator = self.simulator.lock().unwrap_or_else(PoisonError::into_inner);

        match panic::catch_unwind(AssertUnwindSafe(|| f(&mut simulator))) {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(payload) => Err(ExecutionError::Panic {
                model: self.name.clone(),
                payload,
            }
            .to_string()),
        }
    }

    /// Sends the values of every linked non-empty output port to its peer.
    fn propagate_output(&self) -> Result<String, String> {
        // Values are encoded under the lock but sent without it, since a
        // peer may in turn push values to this node.
        let transfers = self.with_simulator(|sim| {
            let mut transfers = Vec::new();
            for route in &self.routes {
                let Some(port) = sim.ports.get(Direction::Output, route.from_port) else {
                    continue;
                };
                if port.is_empty() {
                    continue;
                }
                let values = port.encode_values().map_err(|source| ExecutionError::Remote {
                    node: self.name.clone(),
                    source,
                })?;
                transfers.push((
                    route,
                    Transfer {
                        port: route.to_port.clone(),
                        values: Bytes::from(values),
                    },
                ));
            }

            Ok(transfers)
        })?;

        let count = transfers.len();
        for (route, transfer) in transfers {
            self.send(route, &transfer)?;
        }

        Ok(format!("{} transfer(s) sent", count))
    }

    fn send(&self, route: &Route, transfer: &Transfer) -> Result<(), String> {
        let request = Request::transfer(transfer).map_err(|e| e.to_string())?;
        let response = call(route.address, &request)
            .map_err(|e| format!("node '{}' could not be reached: {}", route.to_node, e))?;

        match response.status {
            Status::Ok => Ok(()),
            Status::Error => Err(format!(
                "node '{}' refused values for port '{}': {}",
                route.to_node, route.to_port, response.message
            )),
        }
    }

    /// Appends transferred values to an input port of the model.
    fn receive(&self, transfer: &Transfer) -> Result<String, String> {
        self.with_simulator(|sim| {
            let index = sim
                .ports
                .find(Direction::Input, &transfer.port)
                .ok_or_else(|| ExecutionError::Protocol {
                    node: self.name.clone(),
                    message: format!("no input port named '{}'", transfer.port),
                })?;
            sim.ports.inputs[index]
                .decode_values(&transfer.values)
                .map_err(|source| ExecutionError::Remote {
                    node: self.name.clone(),
                    source,
                })
        })?;

        Ok(format!("values received on '{}'", transfer.port))
    }
}

impl fmt::Debug for NodeServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeServer")
            .field("name", &self.name)
            .field("address", &self.listener.local_addr().ok())
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

/// An error preventing a node server from starting or running.
#[derive(Debug)]
pub enum NodeError {
    /// The listening socket could not be bound.
    Bind(io::Error),
    /// The node is not registered in the directory.
    UnknownNode(String),
    /// A link refers to an output port the model does not have.
    UnknownPort {
        /// Name of the node.
        node: String,
        /// Name of the port.
        port: String,
    },
    /// A request handler panicked outside of the model.
    HandlerPanicked,
}

impl fmt::Display for NodeError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind(e) => write!(fmt, "the node could not listen: {}", e),
            Self::UnknownNode(name) => write!(fmt, "node '{}' is not in the directory", name),
            Self::UnknownPort { node, port } => {
                write!(fmt, "node '{}' has no output port named '{}'", node, port)
            }
            Self::HandlerPanicked => write!(fmt, "a request handler panicked"),
        }
    }
}

impl Error for NodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Bind(e) => Some(e),
            _ => None,
        }
    }
}
