use std::fmt;
use std::net::SocketAddr;

use tracing::{debug, error};

use crate::runtime::WorkerPool;
use crate::simulation::{ExecutionError, Executor};
use crate::time::parse_time;

use super::wire::{Command, Request, Status};
use super::{call, Directory};

/// A coordinator whose children are atomic models hosted by remote
/// [`NodeServer`](super::NodeServer)s.
///
/// Each phase is broadcast to all nodes concurrently from a worker pool, and
/// the coordinator waits for every response before the phase completes. The
/// outputs of the nodes are pushed from node to node, so the coordinator only
/// orchestrates the phases and tracks the time of the next event.
///
/// The worker pool is created when first needed and released at the end of
/// each simulation run.
pub struct DistributedCoordinator {
    nodes: Vec<(String, SocketAddr)>,
    num_threads: usize,
    pool: Option<WorkerPool>,
    tl: f64,
    tn: f64,
}

impl DistributedCoordinator {
    /// Creates a coordinator for all the nodes of the directory.
    pub fn new(directory: &Directory) -> Self {
        let nodes: Vec<_> = directory
            .nodes
            .iter()
            .map(|node| (node.name.clone(), node.address))
            .collect();
        let num_threads = nodes.len().max(1);

        Self {
            nodes,
            num_threads,
            pool: None,
            tl: 0.0,
            tn: f64::INFINITY,
        }
    }

    /// Limits the number of concurrent requests.
    ///
    /// By default, all nodes are addressed concurrently.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads.max(1);

        self
    }

    /// Returns the number of remote nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Sends a request to every node and returns the response messages in
    /// node order.
    ///
    /// All requests are completed even if some of them fail; the first
    /// failure is then returned.
    fn broadcast(&mut self, request: Request) -> Result<Vec<String>, ExecutionError> {
        if self.nodes.is_empty() {
            return Ok(Vec::new());
        }
        let pool = match self.pool.take() {
            Some(pool) => pool,
            None => WorkerPool::new(self.num_threads).map_err(ExecutionError::Spawn)?,
        };

        let tasks: Vec<_> = self
            .nodes
            .iter()
            .map(|&(_, address)| {
                let request = request.clone();
                move || call(address, &request)
            })
            .collect();
        let results = pool.invoke_all(tasks);
        self.pool = Some(pool);

        let mut messages = Vec::with_capacity(results.len());
        let mut first_error = None;
        for ((node, _), result) in self.nodes.iter().zip(results) {
            let outcome = match result {
                Ok(Ok(response)) => match response.status {
                    Status::Ok => Ok(response.message),
                    Status::Error => Err(ExecutionError::Rejected {
                        node: node.clone(),
                        message: response.message,
                    }),
                },
                Ok(Err(source)) => Err(ExecutionError::Remote {
                    node: node.clone(),
                    source,
                }),
                Err(payload) => Err(ExecutionError::Panic {
                    model: node.clone(),
                    payload,
                }),
            };
            match outcome {
                Ok(message) => messages.push(message),
                Err(e) => {
                    error!(node = node.as_str(), command = %request.command, "{}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(messages),
        }
    }

    /// Queries the next event time of every node.
    fn refresh_time_next(&mut self) -> Result<(), ExecutionError> {
        let messages = self.broadcast(Request::new(Command::TimeAdvance))?;

        let mut tn = f64::INFINITY;
        for ((node, _), message) in self.nodes.iter().zip(&messages) {
            let time = parse_time(message).ok_or_else(|| ExecutionError::Protocol {
                node: node.clone(),
                message: format!("'{}' is not a time", message),
            })?;
            tn = tn.min(time);
        }
        self.tn = tn;

        Ok(())
    }
}

impl Executor for DistributedCoordinator {
    fn initialize(&mut self, time: f64) -> Result<(), ExecutionError> {
        debug!(nodes = self.nodes.len(), time, "initializing remote nodes");
        self.broadcast(Request::at(Command::Initialize, time))?;
        self.tl = time;
        self.refresh_time_next()
    }

    fn exit(&mut self) -> Result<(), ExecutionError> {
        let result = self.broadcast(Request::new(Command::Exit));
        self.finish_run();

        result.map(|_| ())
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
        self.broadcast(Request::at(Command::Lambda, time))?;
        self.broadcast(Request::new(Command::PropagateOutput))?;

        Ok(())
    }

    fn delta(&mut self, time: f64) -> Result<(), ExecutionError> {
        self.broadcast(Request::at(Command::Deltfcn, time))?;
        self.tl = time;
        self.refresh_time_next()
    }

    fn clear(&mut self) -> Result<(), ExecutionError> {
        self.broadcast(Request::new(Command::Clear))?;

        Ok(())
    }

    fn finish_run(&mut self) {
        self.pool = None;
    }
}

impl fmt::Debug for DistributedCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedCoordinator")
            .field("nodes", &self.nodes)
            .field("tl", &self.tl)
            .field("tn", &self.tn)
            .finish_non_exhaustive()
    }
}
