//! Model panic reporting.

use pdevs::bench::Bench;
use pdevs::model::{Atomic, BasicPhase, Context, State};
use pdevs::ports::{InPort, OutPort, PortSet};
use pdevs::simulation::{ExecutionError, InjectError, SimInit};

const MT_NUM_THREADS: usize = 4;

/// Passes a decremented counter along, panicking when it reaches zero.
struct Countdown {
    state: State,
    count: Option<usize>,
    input: InPort<usize>,
    output: OutPort<usize>,
}

impl Countdown {
    fn new(ports: &mut PortSet) -> Self {
        Self {
            state: State::default(),
            count: None,
            input: ports.add_input("in"),
            output: ports.add_output("out"),
        }
    }
}

impl Atomic for Countdown {
    type Phase = BasicPhase;

    fn state(&self) -> &State {
        &self.state
    }
    fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }
    fn delta_int(&mut self, _: &mut Context<'_>) {
        self.count = None;
        self.state.passivate();
    }
    fn delta_ext(&mut self, _: f64, ctx: &mut Context<'_>) {
        if let Some(&count) = ctx.single_value(&self.input) {
            if count == 0 {
                panic!("test message");
            }
            self.count = Some(count - 1);
            self.state.hold_in(BasicPhase::Active, 1.0);
        }
    }
    fn lambda(&self, ctx: &mut Context<'_>) {
        if let Some(count) = self.count {
            ctx.send(&self.output, count);
        }
    }
}

/// Passes a counter around models connected in a ring, the first one being
/// fed from the root.
fn model_panic(num_threads: Option<usize>) {
    const MODEL_COUNT: usize = 5;
    const INIT_COUNTDOWN: usize = 9;

    let mut bench = Bench::new("ring");
    let root = bench.root();
    bench.add_in_port::<usize>(root, "in").unwrap();
    for model_id in 0..MODEL_COUNT {
        bench
            .add_atomic(root, model_id.to_string(), Countdown::new)
            .unwrap();
    }
    for model_id in 0..MODEL_COUNT {
        let next = (model_id + 1) % MODEL_COUNT;
        bench
            .connect(root, &model_id.to_string(), "out", &next.to_string(), "in")
            .unwrap();
    }
    bench.connect(root, "ring", "in", "0", "in").unwrap();

    let init = SimInit::new(bench);
    let init = match num_threads {
        Some(num_threads) => init.with_num_threads(num_threads),
        None => init,
    };
    let mut simu = init.init(0.0).unwrap();
    simu.inject(0.0, "in", INIT_COUNTDOWN).unwrap();

    match simu.simulate(100) {
        Err(ExecutionError::Panic { model, payload }) => {
            let msg = payload.downcast_ref::<&str>().unwrap();
            let panicking_model_id = INIT_COUNTDOWN % MODEL_COUNT;

            assert_eq!(model, format!("ring.{}", panicking_model_id));
            assert_eq!(*msg, "test message");
        }
        _ => panic!("panic not detected"),
    }

    // The simulation cannot be resumed.
    assert!(matches!(simu.step(), Err(ExecutionError::Terminated)));
    assert!(matches!(
        simu.inject(0.0, "in", 1usize),
        Err(InjectError::Execution(ExecutionError::Terminated))
    ));
}

#[test]
fn model_panic_st() {
    model_panic(None);
}

#[test]
fn model_panic_mt() {
    model_panic(Some(MT_NUM_THREADS));
}
