//! Injection of external values and clock behavior.

use pdevs::bench::Bench;
use pdevs::ports::{EventBuffer, EventSlot};
use pdevs::simulation::{ExecutionError, InjectError, SimInit, Simulation};

use crate::models::{Job, Processor};

/// A processor exposed through the `in` and `out` ports of the root.
fn bench() -> (Bench, EventBuffer<(f64, Job)>) {
    let mut bench = Bench::new("sys");
    let root = bench.root();
    bench.add_in_port::<Job>(root, "in").unwrap();
    let out = bench.add_out_port::<Job>(root, "out").unwrap();
    bench
        .add_atomic(root, "processor", |ports| Processor::new(3.0, ports))
        .unwrap();
    bench.connect(root, "sys", "in", "processor", "in").unwrap();
    bench.connect(root, "processor", "out", "sys", "out").unwrap();

    let output = EventBuffer::new();
    bench.add_sink(out, &output).unwrap();

    (bench, output)
}

fn simulation() -> (Simulation, EventBuffer<(f64, Job)>) {
    let (bench, output) = bench();

    (SimInit::new(bench).init(0.0).unwrap(), output)
}

#[test]
fn injected_job_is_processed() {
    let (mut simu, mut output) = simulation();
    assert_eq!(simu.time_next(), f64::INFINITY);

    simu.inject(0.5, "in", Job { id: 1 }).unwrap();
    assert_eq!(simu.time(), 0.5);
    assert_eq!(simu.time_next(), 3.5);
    assert!(output.is_empty());

    assert_eq!(simu.step().unwrap(), Some(3.5));
    assert_eq!(output.drain_all(), vec![(3.5, Job { id: 1 })]);
    assert_eq!(simu.step().unwrap(), None);
}

#[test]
fn injection_cannot_skip_an_event() {
    let (mut simu, mut output) = simulation();
    simu.inject(0.0, "in", Job { id: 1 }).unwrap();

    match simu.inject(4.0, "in", Job { id: 2 }) {
        Err(InjectError::OutOfBounds { elapsed, max }) => {
            assert_eq!(elapsed, 4.0);
            assert_eq!(max, 3.0);
        }
        other => panic!("unexpected result: {:?}", other),
    }

    // A rejected injection leaves the simulation untouched.
    assert_eq!(simu.time(), 0.0);
    assert_eq!(simu.time_next(), 3.0);
    assert_eq!(simu.simulate(10).unwrap(), 1);
    assert_eq!(output.drain_all(), vec![(3.0, Job { id: 1 })]);
}

#[test]
fn busy_processor_drops_jobs() {
    let (mut simu, mut output) = simulation();
    simu.inject(0.0, "in", Job { id: 1 }).unwrap();
    simu.inject(1.0, "in", Job { id: 2 }).unwrap();
    simu.inject_all(1.0, "in", [Job { id: 3 }, Job { id: 4 }])
        .unwrap();

    assert_eq!(simu.time(), 2.0);
    assert_eq!(simu.time_next(), 3.0);
    simu.simulate(10).unwrap();
    assert_eq!(output.drain_all(), vec![(3.0, Job { id: 1 })]);
}

#[test]
fn invalid_injections() {
    let (mut simu, _output) = simulation();

    assert!(matches!(
        simu.inject(0.0, "nope", Job { id: 1 }),
        Err(InjectError::UnknownPort(port)) if port == "nope"
    ));
    assert!(matches!(
        simu.inject(0.0, "in", 7u32),
        Err(InjectError::TypeMismatch { .. })
    ));
    assert!(matches!(
        simu.inject(-1.0, "in", Job { id: 1 }),
        Err(InjectError::InvalidElapsed(_))
    ));
    assert!(matches!(
        simu.inject(f64::NAN, "in", Job { id: 1 }),
        Err(InjectError::InvalidElapsed(_))
    ));
    // The processor is passive, so an infinite delay would not skip any event.
    assert_eq!(simu.time_next(), f64::INFINITY);
    assert!(matches!(
        simu.inject(f64::INFINITY, "in", Job { id: 1 }),
        Err(InjectError::InvalidElapsed(_))
    ));
    assert_eq!(simu.time(), 0.0);
    assert_eq!(simu.time_next(), f64::INFINITY);

    simu.inject(1.0, "in", Job { id: 2 }).unwrap();
    assert_eq!(simu.time_next(), 4.0);
}

#[test]
fn run_duration_is_validated() {
    let (mut simu, mut output) = simulation();
    simu.inject(0.5, "in", Job { id: 1 }).unwrap();

    for duration in [f64::NAN, -1.0] {
        assert!(matches!(
            simu.simulate_for(duration),
            Err(ExecutionError::InvalidDuration(_))
        ));
    }
    assert_eq!(simu.time(), 0.5);
    assert_eq!(simu.time_next(), 3.5);

    assert_eq!(simu.simulate_for(f64::INFINITY).unwrap(), 1);
    assert_eq!(simu.time(), 3.5);
    assert_eq!(output.next(), Some((3.5, Job { id: 1 })));
}

#[test]
fn clock_is_monotonic() {
    let (bench, _output) = bench();
    let mut simu = SimInit::new(bench).init(10.0).unwrap();
    assert_eq!(simu.time(), 10.0);

    let mut times = vec![simu.time()];
    for id in 0..5 {
        simu.inject(0.25, "in", Job { id }).unwrap();
        times.push(simu.time());
        while let Some(time) = simu.step().unwrap() {
            times.push(time);
        }
    }

    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(simu.clock().time(), *times.last().unwrap());
}

#[test]
fn slot_keeps_last_output() {
    let mut bench = Bench::new("sys");
    let root = bench.root();
    bench.add_in_port::<Job>(root, "in").unwrap();
    let out = bench.add_out_port::<Job>(root, "out").unwrap();
    bench
        .add_atomic(root, "processor", |ports| Processor::new(1.0, ports))
        .unwrap();
    bench.connect(root, "sys", "in", "processor", "in").unwrap();
    bench.connect(root, "processor", "out", "sys", "out").unwrap();
    let slot = EventSlot::new();
    bench.add_sink(out, &slot).unwrap();

    let mut simu = SimInit::new(bench).init(0.0).unwrap();
    for id in 1..=3 {
        simu.inject(0.0, "in", Job { id }).unwrap();
        simu.step().unwrap();
    }

    assert_eq!(slot.peek(), Some((3.0, Job { id: 3 })));
}
