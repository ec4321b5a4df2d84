//! Simulation time.
//!
//! Time is virtual: a non-negative `f64` with no relation to wall-clock time,
//! where `f64::INFINITY` stands for "never". The [`Clock`] is owned by the
//! [`Simulation`](crate::simulation::Simulation) driver, which is the only
//! writer; executors receive the current time by value for each phase.
use std::fmt;

/// The simulation clock.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Clock {
    time: f64,
}

impl Clock {
    /// Creates a clock set to the given start time.
    pub fn new(start_time: f64) -> Self {
        Self { time: start_time }
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Moves the clock forward.
    ///
    /// The clock is never clamped: moving backward is a scheduling defect and
    /// is only caught in debug builds.
    pub(crate) fn advance_to(&mut self, time: f64) {
        debug_assert!(
            time >= self.time,
            "the clock cannot move backward from {} to {}",
            self.time,
            time
        );
        self.time = time;
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.time)
    }
}

/// Formats a time for the wire protocol and for logs.
pub(crate) fn format_time(time: f64) -> String {
    if time == f64::INFINITY {
        "inf".to_string()
    } else {
        time.to_string()
    }
}

/// Parses a time formatted with [`format_time`].
pub(crate) fn parse_time(text: &str) -> Option<f64> {
    match text.trim() {
        "inf" => Some(f64::INFINITY),
        t => t.parse().ok().filter(|t: &f64| !t.is_nan()),
    }
}
