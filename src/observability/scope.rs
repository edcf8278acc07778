//! ObservationScope for begin/complete/failed logging around one phase
//!
//! - Logs the begin event on creation
//! - Logs the complete event from `complete`, with elapsed time
//! - Logs the failed event from `fail`, or on drop if neither was called

use std::time::Instant;

use super::events::Event;
use super::log_event_with_fields;

/// Events emitted by one phase
#[derive(Debug, Clone, Copy)]
pub struct Phase {
    pub begin: Event,
    pub complete: Event,
    pub failed: Event,
}

/// Store start-up
pub const STORE_START: Phase = Phase {
    begin: Event::StoreStartBegin,
    complete: Event::StoreStartComplete,
    failed: Event::StoreStartFailed,
};

/// A scope that logs the outcome of a phase exactly once
pub struct ObservationScope {
    phase: Phase,
    fields: Vec<(&'static str, String)>,
    timer: Timer,
    finished: bool,
}

impl ObservationScope {
    /// Begin a phase, logging its begin event with `fields`
    pub fn begin(phase: Phase, fields: &[(&'static str, &str)]) -> Self {
        log_event_with_fields(phase.begin, fields);
        Self {
            phase,
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            timer: Timer::new(),
            finished: false,
        }
    }

    /// Log the complete event with the begin fields, `extra_fields` and
    /// `elapsed_ms`
    pub fn complete(mut self, extra_fields: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.timer.elapsed_ms();
        let mut all: Vec<(&str, &str)> = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all.extend(extra_fields.iter().copied());
        all.push(("elapsed_ms", elapsed.as_str()));
        log_event_with_fields(self.phase.complete, &all);
    }

    /// Log the failed event with a reason
    pub fn fail(mut self, reason: &str) {
        self.finished = true;
        self.log_failed(reason);
    }

    fn log_failed(&self, reason: &str) {
        let mut all: Vec<(&str, &str)> = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all.push(("reason", reason));
        log_event_with_fields(self.phase.failed, &all);
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            self.log_failed("scope dropped without completion");
        }
    }
}

/// A simple duration timer for logging elapsed time
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    /// Elapsed milliseconds as a string
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
