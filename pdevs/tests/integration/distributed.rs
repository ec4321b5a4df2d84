//! Distributed execution over local TCP connections.

use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

use tracing_subscriber::EnvFilter;

use pdevs::distributed::{Directory, DistributedCoordinator, NodeServer};
use pdevs::simulation::{ExecutionError, Executor, SimInit, Simulation, Simulator};

use crate::models::{efp, Generator, Processor, Report, Transducer};

const PERIOD: f64 = 1.0;
const PROCESSING_TIME: f64 = 3.0;
const OBSERVATION_TIME: f64 = 30.0;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn distributed_efp() {
    init_logging();

    let listeners: Vec<_> = ["generator", "processor", "transducer"]
        .into_iter()
        .map(|name| (name, TcpListener::bind("127.0.0.1:0").unwrap()))
        .collect();

    let mut directory = Directory::new();
    for (name, listener) in &listeners {
        directory.add_node(*name, listener.local_addr().unwrap());
    }
    directory
        .link("generator", "out", "processor", "in")
        .link("generator", "out", "transducer", "arrived")
        .link("processor", "out", "transducer", "solved")
        .link("transducer", "out", "generator", "stop");

    let report = Arc::new(Mutex::new(Report::default()));
    let mut handles = Vec::new();
    for (name, listener) in listeners {
        let simulator = match name {
            "generator" => Simulator::new(name, |ports| Generator::new(PERIOD, ports)),
            "processor" => Simulator::new(name, |ports| Processor::new(PROCESSING_TIME, ports)),
            _ => {
                let report = report.clone();
                Simulator::new(name, move |ports| {
                    Transducer::new(OBSERVATION_TIME, report, ports)
                })
            }
        };
        let server = NodeServer::with_listener(listener, &directory, name, simulator).unwrap();
        handles.push(thread::spawn(move || server.serve()));
    }

    let coordinator = DistributedCoordinator::new(&directory);
    assert_eq!(coordinator.num_nodes(), 3);
    let mut simu = Simulation::new(coordinator, 0.0).unwrap();
    assert_eq!(simu.time_next(), PERIOD);

    simu.simulate(u64::MAX).unwrap();
    assert_eq!(simu.time(), OBSERVATION_TIME + PROCESSING_TIME);
    assert_eq!(simu.time_next(), f64::INFINITY);
    simu.exit().unwrap();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    // Same model, run locally.
    let local_report = Arc::new(Mutex::new(Report::default()));
    let bench = efp(PERIOD, PROCESSING_TIME, OBSERVATION_TIME, local_report.clone()).unwrap();
    let mut local = SimInit::new(bench).init(0.0).unwrap();
    local.simulate(u64::MAX).unwrap();

    let report = report.lock().unwrap().clone();
    assert_eq!(report.arrived, 30);
    assert_eq!(report.solved, 9);
    assert_eq!(report, *local_report.lock().unwrap());
}

#[test]
fn unreachable_node_halts_the_simulation() {
    init_logging();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut directory = Directory::new();
    directory.add_node("generator", listener.local_addr().unwrap());

    let server = NodeServer::with_listener(
        listener,
        &directory,
        "generator",
        Simulator::new("generator", |ports| Generator::new(PERIOD, ports)),
    )
    .unwrap();
    let handle = thread::spawn(move || server.serve());

    let mut simu = Simulation::new(DistributedCoordinator::new(&directory), 0.0).unwrap();
    assert_eq!(simu.simulate(3).unwrap(), 3);
    assert_eq!(simu.time(), 3.0);

    // Shut the node down behind the back of the coordinator.
    DistributedCoordinator::new(&directory).exit().unwrap();
    handle.join().unwrap().unwrap();

    match simu.step() {
        Err(ExecutionError::Remote { node, .. }) => assert_eq!(node, "generator"),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
    assert!(matches!(simu.step(), Err(ExecutionError::Terminated)));
}
