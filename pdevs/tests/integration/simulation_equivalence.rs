//! Structure of the DevStone benchmark, and equivalence of the sequential,
//! flattened and parallel executions.
//!
//! Outputs are compared in the order they reach the sinks.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use pdevs::bench::{Bench, ComponentId, CouplingKind};
use pdevs::ports::EventBuffer;
use pdevs::simulation::SimInit;

use crate::models::{devstone, devstone_li_level, efp, fan_in, Job, Report};

#[derive(Copy, Clone, Debug)]
enum Mode {
    Sequential,
    Flattened,
    Parallel,
}

const MODES: [Mode; 3] = [Mode::Sequential, Mode::Flattened, Mode::Parallel];

fn init(bench: Bench, mode: Mode) -> SimInit {
    let init = SimInit::new(bench);
    match mode {
        Mode::Sequential => init,
        Mode::Flattened => init.flatten(true),
        Mode::Parallel => init.with_num_threads(3),
    }
}

/// Runs a DevStone model to completion and returns its outputs.
fn devstone_outputs(
    depth: usize,
    width: usize,
    events: u64,
    mode: Mode,
) -> (Vec<(f64, u64)>, f64) {
    let mut bench = devstone(depth, width, events).unwrap();
    let mut output = EventBuffer::new();
    let port = bench.out_port(bench.root(), "out").unwrap();
    bench.add_sink(port, &output).unwrap();

    let mut simu = init(bench, mode).init(0.0).unwrap();
    simu.simulate(u64::MAX).unwrap();
    let end_time = simu.time();
    simu.exit().unwrap();

    (output.drain_all(), end_time)
}

/// Injects each value on the `in` port of the fan-in bench after the given
/// delay, then runs the model to completion and returns its outputs.
fn fan_in_outputs(injections: &[(f64, u64)], mode: Mode) -> Vec<(f64, u64)> {
    let mut bench = fan_in().unwrap();
    let mut output = EventBuffer::new();
    let port = bench.out_port(bench.root(), "out").unwrap();
    bench.add_sink(port, &output).unwrap();

    let mut simu = init(bench, mode).init(0.0).unwrap();
    let mut now = 0.0;
    for &(delay, value) in injections {
        now += delay;
        simu.simulate_for(now - simu.time()).unwrap();
        simu.inject(now - simu.time(), "in", value).unwrap();
    }
    simu.simulate(u64::MAX).unwrap();
    simu.exit().unwrap();

    output.drain_all()
}

#[test]
fn fan_in_order_is_preserved() {
    // `a` and `d` both emit at 1.75; `right` comes first in the root's
    // output couplings.
    let expected = vec![
        (0.25, 3),
        (0.75, 2),
        (0.75, 32),
        (1.75, 4),
        (1.75, 34),
        (1.75, 24),
        (1.75, 324),
        (1.75, 1),
        (1.75, 31),
        (1.75, 21),
        (1.75, 321),
        (2.75, 14),
        (2.75, 314),
        (2.75, 214),
        (2.75, 3214),
    ];

    for mode in MODES {
        assert_eq!(fan_in_outputs(&[(0.0, 0)], mode), expected, "mode {:?}", mode);
    }
}

#[test]
fn devstone_structure() {
    const DEPTH: usize = 4;
    const WIDTH: usize = 3;

    let mut bench = devstone(DEPTH, WIDTH, 1).unwrap();
    let root = bench.root();
    assert_eq!(bench.count_atomics(), 1 + (DEPTH - 1) * (WIDTH - 1) + 1);

    let top = bench.child_by_name(root, "L3").unwrap();
    assert_eq!(bench.qualified_name(top).unwrap(), "devstone.L3");
    assert_eq!(bench.children(top).unwrap().len(), WIDTH);
    assert_eq!(
        bench.couplings(top, CouplingKind::ExternalInput).unwrap().len(),
        2 + (WIDTH - 1)
    );
    assert_eq!(
        bench.couplings(top, CouplingKind::Internal).unwrap().len(),
        WIDTH - 2
    );
    assert_eq!(
        bench.couplings(top, CouplingKind::ExternalOutput).unwrap().len(),
        1 + (WIDTH - 1)
    );

    let mut deepest = top;
    for name in ["L2", "L1", "L0"] {
        deepest = bench.child_by_name(deepest, name).unwrap();
    }
    assert_eq!(bench.children(deepest).unwrap().len(), 1);

    bench.flatten().unwrap();
    let children = bench.children(root).unwrap().to_vec();
    assert_eq!(children.len(), bench.count_atomics());
    assert!(children.iter().all(|&c| bench.is_atomic(c).unwrap()));
    let names: Vec<_> = children
        .iter()
        .map(|&c| bench.name(c).unwrap().to_string())
        .collect();
    assert!(names.contains(&"L3.L2.L1.L0.A1".to_string()));
    assert!(names.contains(&"L3.A2".to_string()));

    // Only the chain of first-level atomic models reaches the root.
    assert_eq!(
        bench.couplings(root, CouplingKind::ExternalOutput).unwrap().len(),
        1
    );
}

/// Counts the couplings of the given class over all coupled components below
/// `id`, `id` included.
fn count_couplings(bench: &Bench, id: ComponentId, kind: CouplingKind) -> usize {
    if bench.is_atomic(id).unwrap() {
        return 0;
    }
    let own = bench.couplings(id, kind).unwrap().len();
    let nested: usize = bench
        .children(id)
        .unwrap()
        .iter()
        .map(|&child| count_couplings(bench, child, kind))
        .sum();

    own + nested
}

#[test]
fn devstone_li_coupling_counts() {
    for (depth, width) in [(1, 1), (3, 4), (5, 2), (8, 10)] {
        let mut bench = Bench::new("li");
        let root = bench.root();
        let top = devstone_li_level(&mut bench, root, depth, width, 1.0).unwrap();

        assert_eq!(count_couplings(&bench, top, CouplingKind::Internal), 0);
        assert_eq!(
            count_couplings(&bench, top, CouplingKind::ExternalInput),
            width * (depth - 1) + 1
        );
        assert_eq!(
            count_couplings(&bench, top, CouplingKind::ExternalOutput),
            depth
        );
        assert_eq!(bench.count_atomics(), (width - 1) * (depth - 1) + 1);
    }
}

#[test]
fn devstone_outputs_reach_the_root() {
    let (outputs, end_time) = devstone_outputs(3, 2, 4, Mode::Sequential);

    assert_eq!(outputs, vec![(1.5, 1), (2.5, 2), (3.5, 3), (4.5, 4)]);
    assert_eq!(end_time, 4.5);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn devstone_modes_agree(depth in 1usize..5, width in 1usize..5, events in 1u64..6) {
        let (reference, reference_end) = devstone_outputs(depth, width, events, Mode::Sequential);
        prop_assert_eq!(reference.len() as u64, events);

        for mode in [Mode::Flattened, Mode::Parallel] {
            let (outputs, end_time) = devstone_outputs(depth, width, events, mode);
            prop_assert_eq!(&outputs, &reference, "mode {:?}", mode);
            prop_assert_eq!(end_time, reference_end);
        }
    }

    #[test]
    fn injected_fan_in_modes_agree(
        injections in prop::collection::vec((0u32..8, 0u64..100), 1..8),
    ) {
        // Quarter steps keep the event times exact.
        let injections: Vec<_> = injections
            .into_iter()
            .map(|(quarters, value)| (quarters as f64 * 0.25, value))
            .collect();

        let reference = fan_in_outputs(&injections, Mode::Sequential);
        prop_assert!(!reference.is_empty());
        for mode in [Mode::Flattened, Mode::Parallel] {
            let outputs = fan_in_outputs(&injections, mode);
            prop_assert_eq!(&outputs, &reference, "mode {:?}", mode);
        }
    }

    #[test]
    fn efp_modes_agree(
        period in 1u32..4,
        processing_time in 1u32..8,
        observation_time in 10u32..40,
    ) {
        let mut results: Vec<(Report, Vec<(f64, Job)>)> = Vec::new();
        for mode in MODES {
            let report = Arc::new(Mutex::new(Report::default()));
            let mut bench = efp(
                period as f64,
                processing_time as f64,
                observation_time as f64,
                report.clone(),
            )
            .unwrap();
            let mut solved = EventBuffer::new();
            let port = bench.out_port(bench.root(), "solved").unwrap();
            bench.add_sink(port, &solved).unwrap();

            let mut simu = init(bench, mode).init(0.0).unwrap();
            simu.simulate(u64::MAX).unwrap();
            simu.exit().unwrap();

            let report = report.lock().unwrap().clone();
            results.push((report, solved.drain_all()));
        }

        for result in &results[1..] {
            prop_assert_eq!(result, &results[0]);
        }
    }
}
