//! The experimental frame/processor model under every execution strategy.

use std::sync::{Arc, Mutex};

use pdevs::ports::EventBuffer;
use pdevs::simulation::SimInit;

use crate::models::{efp, Job, Report};

const PERIOD: f64 = 1.0;
const PROCESSING_TIME: f64 = 3.0;
const OBSERVATION_TIME: f64 = 100.0;

fn run(configure: impl FnOnce(SimInit) -> SimInit) -> (Report, Vec<(f64, Job)>) {
    let report = Arc::new(Mutex::new(Report::default()));
    let mut bench = efp(PERIOD, PROCESSING_TIME, OBSERVATION_TIME, report.clone()).unwrap();

    let mut solved = EventBuffer::new();
    let port = bench.out_port(bench.root(), "solved").unwrap();
    bench.add_sink(port, &solved).unwrap();

    let mut simu = configure(SimInit::new(bench)).init(0.0).unwrap();
    simu.simulate(u64::MAX).unwrap();

    // Every model is passive once the generator is stopped and the last job
    // left the processor.
    assert_eq!(simu.time_next(), f64::INFINITY);
    assert_eq!(simu.time(), OBSERVATION_TIME + PROCESSING_TIME);
    simu.exit().unwrap();

    let report = report.lock().unwrap().clone();
    (report, solved.drain_all())
}

fn check(report: &Report, solved: &[(f64, Job)]) {
    assert_eq!(report.arrived, 100);
    assert_eq!(report.solved, 33);
    assert_eq!(report.average_turnaround(), 3.0);
    assert_eq!(report.end_time, OBSERVATION_TIME);

    // Jobs 1, 4, 7... are served; the others find the processor busy.
    assert_eq!(solved.len(), 34);
    for (i, (time, job)) in solved.iter().enumerate() {
        let id = 1 + 3 * i as u64;
        assert_eq!(job.id, id);
        assert_eq!(*time, id as f64 + PROCESSING_TIME);
    }
}

#[test]
fn efp_sequential() {
    let (report, solved) = run(|init| init);
    check(&report, &solved);
}

#[test]
fn efp_flattened() {
    let (report, solved) = run(|init| init.flatten(true));
    check(&report, &solved);
}

#[test]
fn efp_parallel() {
    let (report, solved) = run(|init| init.with_num_threads(4));
    check(&report, &solved);
}

#[test]
fn efp_step_by_step() {
    let report = Arc::new(Mutex::new(Report::default()));
    let bench = efp(PERIOD, PROCESSING_TIME, OBSERVATION_TIME, report).unwrap();
    let mut simu = SimInit::new(bench).init(0.0).unwrap();

    assert_eq!(simu.time_next(), PERIOD);
    let mut last = simu.time();
    while let Some(time) = simu.step().unwrap() {
        assert!(time >= last);
        assert_eq!(simu.time(), time);
        last = time;
    }
    assert_eq!(last, OBSERVATION_TIME + PROCESSING_TIME);

    // Once passive, the simulation stays put.
    assert_eq!(simu.simulate(10).unwrap(), 0);
    assert_eq!(simu.time(), last);
}

#[test]
fn efp_bounded_runs() {
    let report = Arc::new(Mutex::new(Report::default()));
    let bench = efp(PERIOD, PROCESSING_TIME, OBSERVATION_TIME, report.clone()).unwrap();
    let mut simu = SimInit::new(bench).init(0.0).unwrap();

    assert_eq!(simu.simulate(5).unwrap(), 5);
    assert_eq!(simu.time(), 5.0);

    // Events at 6, 7, 8, 9 and 10.
    assert_eq!(simu.simulate_for(5.0).unwrap(), 5);
    assert_eq!(simu.time(), 10.0);
    assert_eq!(simu.simulate_for(0.5).unwrap(), 0);
    assert_eq!(simu.time(), 10.0);

    let report = report.lock().unwrap().clone();
    assert_eq!(report.arrived, 10);
    assert_eq!(report.solved, 3);
}
