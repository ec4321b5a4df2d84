//! Atomic models.
//!
//! # The `Atomic` trait
//!
//! An atomic model is a state machine whose control state is a [`State`],
//! i.e. a *phase* and a *sigma*, the latter being the time remaining until the
//! next internal event (`f64::INFINITY` for a passive model).
//!
//! The simulator drives each atomic model through the DEVS transition
//! functions:
//!
//! * [`Atomic::lambda()`] is called when the simulation time reaches the next
//!   event time of the model and may write values to output ports,
//! * [`Atomic::delta_int()`] is then called if the model received no input,
//! * [`Atomic::delta_ext()`] is called when the model received input before
//!   its next event time,
//! * [`Atomic::delta_con()`] is called when both happen at the same time.
//!
//! Before `delta_ext()` and `delta_con()` are called, sigma is decremented by
//! the time elapsed since the last transition so that models only need to
//! change it when they reschedule their next internal event.
//!
//! # Phases
//!
//! The phase is any type implementing [`Phase`]. Models with a simple
//! life-cycle can use [`BasicPhase`]; others typically define their own enum:
//!
//! ```
//! use pdevs::model::Phase;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Valve {
//!     Closed,
//!     Opening,
//!     Open,
//! }
//! impl Phase for Valve {
//!     fn passive() -> Self {
//!         Valve::Closed
//!     }
//!     fn active() -> Self {
//!         Valve::Open
//!     }
//! }
//! ```
//!
//! # Confluent transitions
//!
//! What happens when an input arrives exactly at the next internal event time
//! is a modelling decision. The default [`Atomic::delta_con()`] follows the
//! policy returned by [`Atomic::confluence()`], which models can change
//! without re-implementing the transition itself.
use std::fmt;

mod context;

pub use context::Context;

/// The discrete control state of an atomic model.
pub trait Phase: Clone + PartialEq + fmt::Debug + Send + 'static {
    /// The phase of a model with no scheduled internal event.
    fn passive() -> Self;

    /// The phase of a model that is immediately active.
    fn active() -> Self;
}

/// A ready-made phase for models with a simple life-cycle.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BasicPhase {
    /// No internal event is scheduled.
    Passive,
    /// An internal event is scheduled.
    Active,
    /// A model-specific phase.
    Custom(&'static str),
}

impl Phase for BasicPhase {
    fn passive() -> Self {
        BasicPhase::Passive
    }

    fn active() -> Self {
        BasicPhase::Active
    }
}

impl fmt::Display for BasicPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passive => f.write_str("passive"),
            Self::Active => f.write_str("active"),
            Self::Custom(tag) => f.write_str(tag),
        }
    }
}

/// Phase and sigma of an atomic model.
#[derive(Clone, Debug, PartialEq)]
pub struct State<P: Phase = BasicPhase> {
    phase: P,
    sigma: f64,
}

impl<P: Phase> State<P> {
    /// Creates a state with the given phase and sigma.
    pub fn new(phase: P, sigma: f64) -> Self {
        Self { phase, sigma }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> &P {
        &self.phase
    }

    /// Returns the time remaining until the next internal event.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Sets the phase without changing sigma.
    pub fn set_phase(&mut self, phase: P) {
        self.phase = phase;
    }

    /// Sets sigma without changing the phase.
    ///
    /// Sigma is not validated: a negative or NaN value corrupts the schedule.
    pub fn set_sigma(&mut self, sigma: f64) {
        self.sigma = sigma;
    }

    /// Sets both the phase and sigma.
    pub fn hold_in(&mut self, phase: P, sigma: f64) {
        self.phase = phase;
        self.sigma = sigma;
    }

    /// Switches to the active phase with an immediate internal event.
    pub fn activate(&mut self) {
        self.hold_in(P::active(), 0.0);
    }

    /// Switches to the passive phase.
    pub fn passivate(&mut self) {
        self.hold_in(P::passive(), f64::INFINITY);
    }

    /// Switches to the given phase with no scheduled internal event.
    pub fn passivate_in(&mut self, phase: P) {
        self.hold_in(phase, f64::INFINITY);
    }

    /// Checks whether the model is in the given phase.
    pub fn phase_is(&self, phase: &P) -> bool {
        self.phase == *phase
    }

    /// Checks whether no internal event is scheduled.
    pub fn is_passive(&self) -> bool {
        self.sigma == f64::INFINITY
    }

    pub(crate) fn decrement_sigma(&mut self, elapsed: f64) {
        self.sigma -= elapsed;
    }
}

impl<P: Phase> Default for State<P> {
    fn default() -> Self {
        Self::new(P::passive(), f64::INFINITY)
    }
}

impl<P: Phase> fmt::Display for State<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}, {}", self.phase, self.sigma)
    }
}

/// Ordering of the internal and external transitions in a confluent
/// transition.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Confluence {
    /// Internal transition, then external transition with zero elapsed time.
    #[default]
    InternalFirst,
    /// External transition with the full elapsed time, then internal
    /// transition.
    ExternalFirst,
}

/// Trait implemented by all atomic models.
///
/// Models must be `Send` since they may be executed on worker threads. See the
/// [module-level documentation](self) for the meaning of each transition.
pub trait Atomic: Send + 'static {
    /// The phase type of the model.
    type Phase: Phase;

    /// Returns the current state.
    fn state(&self) -> &State<Self::Phase>;

    /// Returns a mutable reference to the current state.
    fn state_mut(&mut self) -> &mut State<Self::Phase>;

    /// Called once when the simulation is initialized.
    ///
    /// This is where a model sets its initial phase and sigma if these depend
    /// on anything decided after construction.
    fn initialize(&mut self) {}

    /// Called once when the simulation ends.
    fn exit(&mut self) {}

    /// Returns the time remaining until the next internal event.
    fn time_advance(&self) -> f64 {
        self.state().sigma()
    }

    /// Internal transition.
    fn delta_int(&mut self, ctx: &mut Context<'_>);

    /// External transition.
    ///
    /// `elapsed` is the time since the last transition. Input values are
    /// available through the context.
    fn delta_ext(&mut self, elapsed: f64, ctx: &mut Context<'_>);

    /// Ordering policy of the default confluent transition.
    fn confluence(&self) -> Confluence {
        Confluence::InternalFirst
    }

    /// Confluent transition.
    fn delta_con(&mut self, elapsed: f64, ctx: &mut Context<'_>) {
        match self.confluence() {
            Confluence::InternalFirst => {
                self.delta_int(ctx);
                self.delta_ext(0.0, ctx);
            }
            Confluence::ExternalFirst => {
                self.delta_ext(elapsed, ctx);
                self.delta_int(ctx);
            }
        }
    }

    /// Output function.
    fn lambda(&self, ctx: &mut Context<'_>);
}

/// Object-safe view of an atomic model.
pub(crate) trait DynAtomic: Send {
    fn initialize(&mut self);
    fn exit(&mut self);
    fn time_advance(&self) -> f64;
    fn decrement_sigma(&mut self, elapsed: f64);
    fn delta_int(&mut self, ctx: &mut Context<'_>);
    fn delta_ext(&mut self, elapsed: f64, ctx: &mut Context<'_>);
    fn delta_con(&mut self, elapsed: f64, ctx: &mut Context<'_>);
    fn lambda(&self, ctx: &mut Context<'_>);
    fn show_state(&self) -> String;
}

impl<A: Atomic> DynAtomic for A {
    fn initialize(&mut self) {
        Atomic::initialize(self)
    }

    fn exit(&mut self) {
        Atomic::exit(self)
    }

    fn time_advance(&self) -> f64 {
        Atomic::time_advance(self)
    }

    fn decrement_sigma(&mut self, elapsed: f64) {
        self.state_mut().decrement_sigma(elapsed);
    }

    fn delta_int(&mut self, ctx: &mut Context<'_>) {
        Atomic::delta_int(self, ctx)
    }

    fn delta_ext(&mut self, elapsed: f64, ctx: &mut Context<'_>) {
        Atomic::delta_ext(self, elapsed, ctx)
    }

    fn delta_con(&mut self, elapsed: f64, ctx: &mut Context<'_>) {
        Atomic::delta_con(self, elapsed, ctx)
    }

    fn lambda(&self, ctx: &mut Context<'_>) {
        Atomic::lambda(self, ctx)
    }

    fn show_state(&self) -> String {
        self.state().to_string()
    }
}
